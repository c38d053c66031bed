//! SD-WAN zone and default route provisioning for one FortiGate
//!
//! Stages run in order: resolve the traffic VDOM, create the
//! "Internet SD-WAN" zone, attach the WAN interface to it, then configure
//! the default route. A failed VDOM lookup ends the run; for the other
//! stages the chain is lenient unless [`ProvisionOptions::halt_on_error`]
//! is set.

use std::fmt;
use std::net::Ipv4Addr;

use tracing::{info, instrument, warn};

use crate::client::FgtClient;
use crate::error::{FgtError, Result, StepFailure};
use crate::prompt::{ask_ipv4, ask_non_empty, choose, Prompter};
use crate::types::{
    NewStaticRoute, SdwanMember, Vdom, VdomSelection, DEFAULT_ROUTE_DST, SDWAN_ZONE_NAME,
};

/// Operator-supplied provisioning values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionInput {
    pub management_address: Ipv4Addr,
    pub wan_interface: String,
    pub gateway: Ipv4Addr,
}

impl ProvisionInput {
    /// Fill in whatever was not given on the command line by prompting
    pub fn collect<P: Prompter + ?Sized>(
        prompter: &mut P,
        management_address: Option<Ipv4Addr>,
        wan_interface: Option<String>,
        gateway: Option<Ipv4Addr>,
    ) -> Result<Self> {
        let management_address = match management_address {
            Some(address) => address,
            None => ask_ipv4(prompter, "Please enter the FortiGate management IPv4 address: ")?,
        };
        let wan_interface = match wan_interface.filter(|w| !w.trim().is_empty()) {
            Some(wan) => wan,
            None => ask_non_empty(prompter, "Enter the primary WAN name: ")?,
        };
        let gateway = match gateway {
            Some(gateway) => gateway,
            None => ask_ipv4(prompter, "Enter the Internet gateway IPv4 address: ")?,
        };
        Ok(Self {
            management_address,
            wan_interface,
            gateway,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    /// Skip the remaining stages after the first failure
    pub halt_on_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    ResolveVdom,
    CreateZone,
    AttachInterface,
    ConfigureDefaultRoute,
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolveVdom => write!(f, "Resolve VDOM"),
            Self::CreateZone => write!(f, "Create SD-WAN zone"),
            Self::AttachInterface => write!(f, "Attach WAN interface"),
            Self::ConfigureDefaultRoute => write!(f, "Configure default route"),
        }
    }
}

/// What the route stage did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// An existing default route was found and deleted
    DeletedExisting { seq_num: u64 },
    /// No default route existed; one was created on the SD-WAN zone
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    /// Stage succeeded, with a human-readable summary
    Succeeded(String),
    Failed(StepFailure),
    /// Not run because an earlier stage failed with `halt_on_error`
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: ProvisionStage,
    pub status: StageStatus,
}

/// Outcome of a provisioning run
#[derive(Debug, Clone, Default)]
pub struct ProvisionReport {
    pub vdom: Option<VdomSelection>,
    pub stages: Vec<StageReport>,
    pub route: Option<RouteAction>,
}

impl ProvisionReport {
    pub fn has_failures(&self) -> bool {
        self.stages
            .iter()
            .any(|s| !matches!(s.status, StageStatus::Succeeded(_)))
    }

    pub fn status(&self, stage: ProvisionStage) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| &s.status)
    }

    fn push(&mut self, stage: ProvisionStage, status: StageStatus) {
        match &status {
            StageStatus::Succeeded(msg) => info!(%stage, "{}", msg),
            StageStatus::Failed(failure) => warn!(%stage, "{}", failure),
            StageStatus::Skipped => info!(%stage, "skipped"),
        }
        self.stages.push(StageReport { stage, status });
    }
}

/// Pick the traffic VDOM
///
/// Exactly two VDOMs (root plus one other) selects the second without
/// asking. More than two shows a 1-based menu over the whole list, root
/// included. A single VDOM is used as-is.
pub fn select_vdom<P: Prompter + ?Sized>(
    vdoms: &[Vdom],
    prompter: &mut P,
) -> Result<VdomSelection> {
    let name = match vdoms {
        [] => return Err(FgtError::input("device returned no VDOMs")),
        [only] => only.name.clone(),
        [_, second] => second.name.clone(),
        _ => {
            let names: Vec<String> = vdoms.iter().map(|v| v.name.clone()).collect();
            let index = choose(
                prompter,
                "Please select the correct VDOM:",
                &names,
                "Enter the number of the VDOM: ",
            )?;
            names[index].clone()
        }
    };
    Ok(VdomSelection { name })
}

/// Provisioning workflow for one device
pub struct ProvisioningWorkflow<'a> {
    client: &'a FgtClient,
    input: &'a ProvisionInput,
    options: ProvisionOptions,
}

impl<'a> ProvisioningWorkflow<'a> {
    pub fn new(client: &'a FgtClient, input: &'a ProvisionInput, options: ProvisionOptions) -> Self {
        Self {
            client,
            input,
            options,
        }
    }

    #[instrument(skip_all, fields(address = %self.input.management_address))]
    pub async fn run<P: Prompter + ?Sized>(&self, prompter: &mut P) -> ProvisionReport {
        let mut report = ProvisionReport::default();

        let vdom = match self.resolve_vdom(prompter).await {
            Ok(vdom) => vdom,
            Err(e) => {
                report.push(ProvisionStage::ResolveVdom, StageStatus::Failed((&e).into()));
                for stage in [
                    ProvisionStage::CreateZone,
                    ProvisionStage::AttachInterface,
                    ProvisionStage::ConfigureDefaultRoute,
                ] {
                    report.push(stage, StageStatus::Skipped);
                }
                return report;
            }
        };
        report.push(
            ProvisionStage::ResolveVdom,
            StageStatus::Succeeded(format!("The VDOM is set to {}", vdom.name)),
        );
        let client = self.client.in_vdom(&vdom.name);
        report.vdom = Some(vdom);

        let zone = client.create_sdwan_zones(&[SDWAN_ZONE_NAME]).await;
        if !self.record(
            &mut report,
            ProvisionStage::CreateZone,
            zone.map(|_| format!("{} zone created successfully.", SDWAN_ZONE_NAME)),
        ) {
            return report;
        }

        let wan = &self.input.wan_interface;
        let member = client
            .set_sdwan_members(vec![SdwanMember {
                interface: wan.clone(),
                zone: SDWAN_ZONE_NAME.to_string(),
                gateway: self.input.gateway.to_string(),
            }])
            .await;
        if !self.record(
            &mut report,
            ProvisionStage::AttachInterface,
            member.map(|_| {
                format!(
                    "{} interface added to the {} zone successfully.",
                    wan, SDWAN_ZONE_NAME
                )
            }),
        ) {
            return report;
        }

        match configure_default_route(&client).await {
            Ok(action) => {
                let msg = match &action {
                    RouteAction::DeletedExisting { seq_num } => {
                        format!("Default route (seq {}) deleted successfully.", seq_num)
                    }
                    RouteAction::Created => format!(
                        "Default route set on the {} zone successfully.",
                        SDWAN_ZONE_NAME
                    ),
                };
                report.route = Some(action);
                report.push(
                    ProvisionStage::ConfigureDefaultRoute,
                    StageStatus::Succeeded(msg),
                );
            }
            Err(e) => report.push(
                ProvisionStage::ConfigureDefaultRoute,
                StageStatus::Failed((&e).into()),
            ),
        }

        report
    }

    async fn resolve_vdom<P: Prompter + ?Sized>(&self, prompter: &mut P) -> Result<VdomSelection> {
        let vdoms = self.client.list_vdoms().await?;
        select_vdom(&vdoms, prompter)
    }

    /// Record a stage result; returns false when the run must stop
    fn record(
        &self,
        report: &mut ProvisionReport,
        stage: ProvisionStage,
        result: Result<String>,
    ) -> bool {
        match result {
            Ok(msg) => {
                report.push(stage, StageStatus::Succeeded(msg));
                true
            }
            Err(e) => {
                report.push(stage, StageStatus::Failed((&e).into()));
                if self.options.halt_on_error {
                    let remaining = [
                        ProvisionStage::CreateZone,
                        ProvisionStage::AttachInterface,
                        ProvisionStage::ConfigureDefaultRoute,
                    ]
                    .into_iter()
                    .skip_while(|s| *s != stage)
                    .skip(1);
                    for s in remaining {
                        report.push(s, StageStatus::Skipped);
                    }
                    false
                } else {
                    true
                }
            }
        }
    }
}

/// Delete the first existing default route, or create one on the SD-WAN zone
async fn configure_default_route(client: &FgtClient) -> Result<RouteAction> {
    let routes = client.list_static_routes().await?;
    match routes.iter().find(|r| r.dst == DEFAULT_ROUTE_DST) {
        Some(route) => {
            client.delete_static_route(route.seq_num).await?;
            Ok(RouteAction::DeletedExisting {
                seq_num: route.seq_num,
            })
        }
        None => {
            client
                .create_static_route(&NewStaticRoute::default_via_zone(SDWAN_ZONE_NAME))
                .await?;
            Ok(RouteAction::Created)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPrompter;

    fn vdoms(names: &[&str]) -> Vec<Vdom> {
        names
            .iter()
            .map(|n| Vdom {
                name: n.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_two_vdoms_auto_selects_second() {
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        let selection = select_vdom(&vdoms(&["root", "traffic"]), &mut prompter).unwrap();

        assert_eq!(selection.name, "traffic");
        assert!(prompter.asked().is_empty());
    }

    #[test]
    fn test_three_vdoms_prompts_menu() {
        let mut prompter = ScriptedPrompter::new(["2"]);
        let selection =
            select_vdom(&vdoms(&["root", "traffic", "guest"]), &mut prompter).unwrap();

        assert_eq!(selection.name, "traffic");
        assert_eq!(prompter.asked().len(), 1);
        assert!(prompter.said().contains(&"1. root".to_string()));
        assert!(prompter.said().contains(&"3. guest".to_string()));
    }

    #[test]
    fn test_root_remains_selectable() {
        let mut prompter = ScriptedPrompter::new(["1"]);
        let selection = select_vdom(&vdoms(&["root", "a", "b"]), &mut prompter).unwrap();
        assert_eq!(selection.name, "root");
    }

    #[test]
    fn test_single_and_empty_vdom_lists() {
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        assert_eq!(
            select_vdom(&vdoms(&["root"]), &mut prompter).unwrap().name,
            "root"
        );
        assert!(select_vdom(&[], &mut prompter).is_err());
    }

    #[test]
    fn test_collect_input_prompts_only_for_missing_values() {
        let mut prompter = ScriptedPrompter::new(["not-an-ip", "192.0.2.1"]);
        let input = ProvisionInput::collect(
            &mut prompter,
            Some(Ipv4Addr::new(10, 0, 0, 1)),
            Some("wan1".to_string()),
            None,
        )
        .unwrap();

        assert_eq!(input.wan_interface, "wan1");
        assert_eq!(input.gateway, Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(prompter.asked().len(), 2);
    }

    #[test]
    fn test_report_failures() {
        let mut report = ProvisionReport::default();
        report.push(ProvisionStage::ResolveVdom, StageStatus::Succeeded("ok".into()));
        assert!(!report.has_failures());
        report.push(ProvisionStage::CreateZone, StageStatus::Skipped);
        assert!(report.has_failures());
        assert_eq!(
            report.status(ProvisionStage::CreateZone),
            Some(&StageStatus::Skipped)
        );
    }
}
