//! Post-rollback check for objects the release left behind

use crate::app::state::RunContext;
use crate::deploy::command::tail;
use crate::targets::cluster::kubectl;
use crate::targets::deletion::Resource;

/// Kinds checked after a rollback
pub fn verified_kinds(include_pvcs: bool) -> &'static str {
    if include_pvcs {
        "pods,services,secrets,pvc"
    } else {
        "pods,services,secrets"
    }
}

/// List objects still carrying the release's instance label
///
/// Each one is a WARN. The count is informational; pods in `Terminating`
/// routinely show up here for a few seconds.
pub async fn remaining_resources(ctx: &RunContext) -> Vec<Resource> {
    let cluster = &ctx.config.cluster;
    let command = kubectl([
        "get".to_string(),
        verified_kinds(ctx.config.flags.delete_data).to_string(),
        "-n".to_string(),
        cluster.namespace.clone(),
        "-l".to_string(),
        cluster.selector(),
        "-o".to_string(),
        "name".to_string(),
    ]);

    let output = ctx.executor.query(&command).await;
    if !output.success() {
        ctx.log.warn(format!(
            "Could not verify clean state: {}",
            tail(&output.stderr, 1)
        ));
        return Vec::new();
    }

    let remaining: Vec<Resource> = output
        .stdout_lines()
        .into_iter()
        .filter_map(|line| Resource::from_name_line(line, &cluster.namespace))
        .collect();
    for resource in &remaining {
        ctx.log.warn(format!("Still present: {}", resource));
    }
    ctx.log.info(format!(
        "{} object(s) remain for release {}",
        remaining.len(),
        cluster.release
    ));
    remaining
}
