use crate::models::VName;

/// Limits redundancy in extractor output by deciding, per resource, which
/// claimant is responsible for emitting it.
///
/// It is always safe to return `true`: the result is redundant output
/// rather than dropped output.
pub trait ClaimClient {
    /// Makes a claim for `vname` on behalf of `claimant`. Returns whether
    /// the claimant is responsible for the resource.
    fn claim(&mut self, claimant: &VName, vname: &VName) -> bool;
}
