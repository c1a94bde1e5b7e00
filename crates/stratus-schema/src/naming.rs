//! Names of datasets, axis variables and output files.

use stratus_types::constants::{
    AXIS_NAMES, COMPONENT_NAMES, OFFSET_GLOBAL_PREFIX, SIZE_GLOBAL_PREFIX, SIZE_LOCAL_PREFIX,
};

use crate::queue::AxisRole;

/// Dataset name of a field: `<group>_<field>`.
pub fn dataset_name(group: &str, field: &str) -> String {
    format!("{group}_{field}")
}

/// Dataset name of one component. Single-component fields carry no suffix.
pub fn component_name(group: &str, field: &str, components: usize, component: usize) -> String {
    if components > 1 {
        format!("{}_{}", dataset_name(group, field), COMPONENT_NAMES[component])
    } else {
        dataset_name(group, field)
    }
}

/// Name of a derived field computed for one particle species.
pub fn derived_name(solver: &str, species: &str) -> String {
    format!("{solver}_{species}")
}

fn role_prefix(role: AxisRole) -> &'static str {
    match role {
        AxisRole::LocalSize => SIZE_LOCAL_PREFIX,
        AxisRole::GlobalSize => SIZE_GLOBAL_PREFIX,
        AxisRole::GlobalOffset => OFFSET_GLOBAL_PREFIX,
    }
}

/// Name of the axis variable for `role` along `axis`, e.g. `size_local_y`.
pub fn axis_var(role: AxisRole, axis: usize) -> String {
    format!("{}{}", role_prefix(role), AXIS_NAMES[axis])
}

/// Dimension-ordered, comma-joined shape expression for `role`.
pub fn shape_expr(role: AxisRole, dims: usize) -> String {
    (0..dims)
        .map(|axis| axis_var(role, axis))
        .collect::<Vec<_>>()
        .join(",")
}

/// Output file name `<prefix>_<iteration><suffix>.<ext>`.
pub fn file_name(prefix: &str, iteration: u32, suffix: &str, extension: &str) -> String {
    format!("{prefix}_{iteration}{suffix}.{extension}")
}
