pub const LAYOUT_FORMAT_VERSION: u32 = 1;
pub const LAYOUT_SUFFIX: &str = ".layout.json";

pub const INDEX_FIELD_SEPARATOR: char = ',';
pub const INDEX_FIELD_COUNT: usize = 3;
