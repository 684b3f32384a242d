/// Marker layout metadata stored alongside the queues.
///
/// The payload is produced and interpreted elsewhere; the store only carries
/// the bytes into and out of the container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerPositions(Vec<u8>);

impl MarkerPositions {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
