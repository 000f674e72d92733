//! Resolved cluster context for a single run

use serde::{Deserialize, Serialize};

/// Identity and access target resolved once per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterContext {
    /// Project the cluster and pushed images belong to
    pub project_id: String,

    pub cluster_name: String,

    /// Zone or region
    pub location: String,
}

impl ClusterContext {
    pub fn new(
        project_id: impl Into<String>,
        cluster_name: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            cluster_name: cluster_name.into(),
            location: location.into(),
        }
    }

    /// `project/location/cluster`, for logs
    pub fn describe(&self) -> String {
        format!("{}/{}/{}", self.project_id, self.location, self.cluster_name)
    }
}
