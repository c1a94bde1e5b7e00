//! Layout constants and output defaults.

/// Axis index along which the moving window slides.
pub const SLIDING_AXIS: usize = 1;

/// Axis letters used in per-dimension variable names.
pub const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

/// Component suffixes for multi-component fields.
pub const COMPONENT_NAMES: [&str; 4] = ["x", "y", "z", "w"];

/// Largest component count a field may declare.
pub const MAX_COMPONENTS: usize = COMPONENT_NAMES.len();

/// Global scalar holding the iteration index.
pub const ITERATION_VAR: &str = "iteration";

/// Global scalar holding the cumulative window slide count.
pub const SLIDES_VAR: &str = "sim_slides";

/// Prefix of the per-dimension local size variables.
pub const SIZE_LOCAL_PREFIX: &str = "size_local_";

/// Prefix of the per-dimension global size variables.
pub const SIZE_GLOBAL_PREFIX: &str = "size_global_";

/// Prefix of the per-dimension global offset variables.
pub const OFFSET_GLOBAL_PREFIX: &str = "offset_global_";

/// Reserved bytes for the two global scalars.
pub const GLOBAL_SCALAR_BYTES: u64 = 2 * std::mem::size_of::<u32>() as u64;

/// Reserved bytes for one axis metadata variable.
pub const AXIS_VAR_BYTES: u64 = std::mem::size_of::<i32>() as u64;

/// Descriptive metadata reserved per declared field component.
pub const FIELD_META_BYTES: u64 = 3 * std::mem::size_of::<i32>() as u64;

/// Default output file prefix.
pub const DEFAULT_FILE_PREFIX: &str = "simData";

/// Default variable group name.
pub const DEFAULT_GROUP: &str = "fields";

/// Suffix appended to the file stem of the ghost segment pass.
pub const GHOST_SUFFIX: &str = "_ghosts";

/// Initial backend buffer allocation in MiB.
pub const INITIAL_BUFFER_MB: u64 = 1;
