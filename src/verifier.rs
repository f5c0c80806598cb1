/// The injected zero-knowledge verification capability.
///
/// The proving system is swappable without touching protocol logic: the
/// core hands the opaque proof and public-input bytes through and acts on
/// the boolean. Calls are treated as synchronous, bounded-cost pure
/// functions.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, proof: &[u8], public_inputs: &[u8]) -> bool;
}
