//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Keys present in `section`, in no particular order. Empty if the
    /// section does not exist.
    fn section_keys(&self, section: &str) -> Vec<String>;
}
