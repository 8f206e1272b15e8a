pub struct ChannelNameResolver;

impl ChannelNameResolver {
    /// Final channel names for a matrix with `n_channels` columns.
    ///
    /// Empty `decoded` names are replaced by "0", "1", ... . The override
    /// replaces names position by position, as far as the shorter list
    /// reaches; it never changes the length. A single empty string counts
    /// as no override.
    pub fn resolve(
        decoded: Vec<String>,
        n_channels: usize,
        overrides: Option<&[String]>,
    ) -> Vec<String> {
        let mut channels = if decoded.is_empty() {
            Self::default_names(n_channels)
        } else {
            decoded
        };

        if let Some(overrides) = overrides.filter(|o| !Self::is_unset(o)) {
            for (slot, name) in channels.iter_mut().zip(overrides) {
                slot.clone_from(name);
            }
        }
        channels
    }

    pub fn default_names(n_channels: usize) -> Vec<String> {
        (0..n_channels).map(|i| i.to_string()).collect()
    }

    fn is_unset(overrides: &[String]) -> bool {
        matches!(overrides, [only] if only.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_synthesizes_when_decoded_empty() {
        assert_eq!(
            ChannelNameResolver::resolve(Vec::new(), 3, None),
            names(&["0", "1", "2"])
        );
    }

    #[test]
    fn test_override_fewer_names() {
        let overrides = names(&["CH1", "CH2"]);
        let resolved = ChannelNameResolver::resolve(
            names(&["A", "B", "C", "D", "E"]),
            5,
            Some(&overrides),
        );
        assert_eq!(resolved, names(&["CH1", "CH2", "C", "D", "E"]));
    }

    #[test]
    fn test_override_more_names_keeps_length() {
        let overrides = names(&["a", "b", "c", "d"]);
        let resolved = ChannelNameResolver::resolve(Vec::new(), 2, Some(&overrides));
        assert_eq!(resolved, names(&["a", "b"]));
    }

    #[test]
    fn test_single_empty_override_is_ignored() {
        let overrides = names(&[""]);
        let resolved = ChannelNameResolver::resolve(Vec::new(), 2, Some(&overrides));
        assert_eq!(resolved, names(&["0", "1"]));
    }
}
