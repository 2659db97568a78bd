// src/provision.rs

//! Provisioning: explicit role assignments and a sample configuration.
//!
//! Admin privileges come only from the `user_roles` table, seeded here from
//! `[provisioning].admins`.

use serde::Serialize;
use tracing::info;

use crate::config::ProvisioningSection;
use crate::configuration::NewConfiguration;
use crate::errors::Result;
use crate::store::Store;
use crate::types::{ConfigId, Role, UserId};

/// What a provisioning pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    pub admins_assigned: Vec<UserId>,
    pub sample_configuration: Option<ConfigId>,
}

/// The configuration seeded for the first admin.
pub fn sample_configuration() -> NewConfiguration {
    NewConfiguration {
        name: "OpenAI GPT-4".to_string(),
        api_url: "https://api.openai.com".to_string(),
        timeout_secs: 120,
        num_samples: 10,
        tasks: vec![
            "hellaswag".to_string(),
            "arc_easy".to_string(),
            "truthfulqa_mc2".to_string(),
        ],
    }
}

/// Assign the admin role to every listed user, and seed the sample
/// configuration for the first admin if they have none yet.
///
/// Idempotent.
pub fn provision<S>(store: &S, section: &ProvisioningSection) -> Result<ProvisionReport>
where
    S: Store + ?Sized,
{
    let mut report = ProvisionReport::default();

    for &admin in &section.admins {
        store.assign_role(admin, Role::Admin)?;
        report.admins_assigned.push(admin);
    }

    if let Some(&first_admin) = section.admins.first() {
        if store.list_configurations(first_admin)?.is_empty() {
            let created = store.create_configuration(first_admin, &sample_configuration())?;
            info!(config_id = created.id, user = first_admin, "seeded sample configuration");
            report.sample_configuration = Some(created.id);
        } else {
            info!(user = first_admin, "sample configuration already present; skipping");
        }
    }

    Ok(report)
}
