pub mod classpath;
pub mod natives;

pub use classpath::{
    build_classpath, classpath_entries, get_classpath_separator, safe_path_str, substitutions,
};
pub use natives::{NativeExtractor, NativesSession};
