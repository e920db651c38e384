//! IAM role management for the recommendation service

use crate::aws::context::AwsContext;
use crate::aws::error::from_sdk_error;
use anyhow::{Context, Result};
use aws_sdk_iam::Client;
use tracing::{debug, info, warn};

/// Managed policies attached to the access role
pub const ACCESS_ROLE_POLICIES: &[&str] = &[
    "arn:aws:iam::aws:policy/service-role/AmazonPersonalizeFullAccess",
    "arn:aws:iam::aws:policy/AmazonS3FullAccess",
];

/// The trust policy allowing the recommendation service to assume the role
const PERSONALIZE_ASSUME_ROLE_POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {
            "Effect": "Allow",
            "Principal": {
                "Service": "personalize.amazonaws.com"
            },
            "Action": "sts:AssumeRole"
        }
    ]
}"#;

/// The access role as returned by [`IamClient::create_access_role`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRole {
    pub arn: String,
    /// False when a role with the same name already existed
    pub created: bool,
}

/// IAM client for the access role
pub struct IamClient {
    client: Client,
}

impl IamClient {
    /// Create an IAM client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
        }
    }

    /// Create the access role and attach its managed policies.
    ///
    /// An existing role with the same name is adopted and reported with
    /// `created: false`.
    pub async fn create_access_role(&self, role_name: &str) -> Result<AccessRole> {
        info!(role_name = %role_name, "Creating IAM access role");

        let created = self
            .client
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(PERSONALIZE_ASSUME_ROLE_POLICY)
            .description("Read access to recommendation training data")
            .send()
            .await
            .map_err(from_sdk_error);

        let role = match created {
            Ok(output) => AccessRole {
                arn: output
                    .role()
                    .map(|role| role.arn().to_string())
                    .context("CreateRole returned no role")?,
                created: true,
            },
            Err(e) if e.is_already_exists() => {
                warn!(role_name = %role_name, "IAM role already exists, adopting it");
                let arn = self
                    .client
                    .get_role()
                    .role_name(role_name)
                    .send()
                    .await
                    .map_err(from_sdk_error)
                    .context("Failed to look up existing IAM role")?
                    .role()
                    .map(|role| role.arn().to_string())
                    .context("GetRole returned no role")?;
                AccessRole {
                    arn,
                    created: false,
                }
            }
            Err(e) => return Err(e).context("Failed to create IAM role"),
        };

        for policy_arn in ACCESS_ROLE_POLICIES {
            self.client
                .attach_role_policy()
                .role_name(role_name)
                .policy_arn(*policy_arn)
                .send()
                .await
                .map_err(from_sdk_error)
                .with_context(|| format!("Failed to attach {} to role", policy_arn))?;
            debug!(role_name = %role_name, policy_arn = %policy_arn, "Managed policy attached");
        }

        info!(role_name = %role_name, role_arn = %role.arn, created = role.created, "IAM access role ready");
        Ok(role)
    }

    /// Detach the managed policies and delete the role
    pub async fn delete_access_role(&self, role_name: &str) -> Result<()> {
        info!(role_name = %role_name, "Deleting IAM access role");

        // Detach failures are not fatal: the policy may never have been attached
        for policy_arn in ACCESS_ROLE_POLICIES {
            if let Err(e) = self
                .client
                .detach_role_policy()
                .role_name(role_name)
                .policy_arn(*policy_arn)
                .send()
                .await
                .map_err(from_sdk_error)
            {
                if e.is_not_found() {
                    debug!(policy_arn = %policy_arn, "Policy not attached (may already be detached)");
                } else {
                    warn!(error = %e, policy_arn = %policy_arn, "Failed to detach managed policy");
                }
            }
        }

        self.client
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(from_sdk_error)
            .context("Failed to delete IAM role")?;

        info!(role_name = %role_name, "IAM role deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_policy_names_service_principal() {
        let policy: serde_json::Value =
            serde_json::from_str(PERSONALIZE_ASSUME_ROLE_POLICY).unwrap();
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"],
            "personalize.amazonaws.com"
        );
        assert_eq!(policy["Statement"][0]["Action"], "sts:AssumeRole");
    }
}
