use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
    /// Projects this caller may act on. `None` grants every project.
    pub projects: Option<Vec<String>>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
            projects: None,
        }
    }

    /// Whether this identity owns `project_id`.
    pub fn can_access(&self, project_id: &str) -> bool {
        match &self.projects {
            None => true,
            Some(projects) => projects.iter().any(|p| p == project_id),
        }
    }
}
