use serde::{Deserialize, Serialize};

/// Database connection details handed to frontend renderers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(alias = "dbname", skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(alias = "user", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

impl ConnectionDescriptor {
    /// A frontend that already holds a session only needs to know where the server is
    pub fn for_session(&self, session_id: Option<&str>) -> Self {
        match session_id {
            Some(_) => Self {
                database: None,
                username: None,
                password: None,
                ..self.clone()
            },
            None => self.clone(),
        }
    }
}
