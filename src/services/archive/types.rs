/// One file extracted from a pack, before it is grouped into a tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub path: String,
    pub payload: Vec<u8>,
}
