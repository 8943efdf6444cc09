use std::collections::HashMap;

use xrefscope_api::models::VName;
use xrefscope_api::ClaimClient;

/// A client that accepts every claim. Produces redundant rather than
/// dropped output, which is always safe.
#[derive(Debug, Default)]
pub struct AcceptAllClient;

impl ClaimClient for AcceptAllClient {
    fn claim(&mut self, _claimant: &VName, _vname: &VName) -> bool {
        true
    }
}

/// A client that makes static decisions about resources when possible.
///
/// Responsibility assignments are loaded up front (typically from the
/// output of a whole-repository claim assignment pass); unassigned
/// resources are either processed by everyone or by no one, depending on
/// `process_unknown_status`.
#[derive(Debug)]
pub struct StaticClaimClient {
    claim_table: HashMap<VName, VName>,
    process_unknown_status: bool,
}

impl Default for StaticClaimClient {
    fn default() -> Self {
        StaticClaimClient {
            claim_table: HashMap::new(),
            process_unknown_status: true,
        }
    }
}

impl StaticClaimClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns responsibility for `claimable` to `claimant`.
    pub fn assign_claim(&mut self, claimable: VName, claimant: VName) {
        self.claim_table.insert(claimable, claimant);
    }

    /// Whether entities without an assigned claimant are processed by every
    /// claimant.
    pub fn set_process_unknown_status(&mut self, process_unknown_status: bool) {
        self.process_unknown_status = process_unknown_status;
    }
}

impl ClaimClient for StaticClaimClient {
    fn claim(&mut self, claimant: &VName, vname: &VName) -> bool {
        match self.claim_table.get(vname) {
            Some(assigned) => assigned == claimant,
            None => self.process_unknown_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vname(signature: &str) -> VName {
        VName {
            signature: signature.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn assigned_claims_bind() {
        let mut client = StaticClaimClient::new();
        client.assign_claim(vname("header"), vname("tu1"));
        assert!(client.claim(&vname("tu1"), &vname("header")));
        assert!(!client.claim(&vname("tu2"), &vname("header")));
    }

    #[test]
    fn unknown_status_is_configurable() {
        let mut client = StaticClaimClient::new();
        assert!(client.claim(&vname("tu1"), &vname("header")));
        client.set_process_unknown_status(false);
        assert!(!client.claim(&vname("tu1"), &vname("header")));
    }
}
