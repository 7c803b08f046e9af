//! Face-layer configuration shared by the consumer and producer CLIs.

/// Options controlling how a face is opened and its control-plane
/// registration, common to both consumer and producer roles.
#[derive(Debug, Clone)]
pub struct FaceOptions {
    pub gql_server: String,
    pub mtu: usize,
    pub dataroom: i64,
}

impl Default for FaceOptions {
    fn default() -> Self {
        Self {
            gql_server: "http://localhost:3030".to_string(),
            mtu: 8000,
            dataroom: 9000,
        }
    }
}
