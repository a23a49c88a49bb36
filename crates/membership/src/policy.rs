//! Enforcement policy
//!
//! Policy data is passed into the reconciler rather than compiled in, so
//! tests and deployments can supply their own admin list.

use std::collections::{BTreeSet, HashSet};

use studiodir_shared::StudioType;

/// Emails whose listings are always kept live
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowlist {
    emails: HashSet<String>,
}

impl AdminAllowlist {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|e| normalize_email(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { emails }
    }

    /// Parse a comma-separated list, e.g. the `ADMIN_EMAILS` variable
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&normalize_email(email))
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// What a downgrade strips from a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PremiumFeaturePolicy {
    /// Type tags only premium listings may carry
    pub premium_studio_types: BTreeSet<StudioType>,
    /// Tag added when stripping premium tags would leave none
    pub fallback_studio_type: StudioType,
    /// Account metadata keys only premium accounts may set
    pub premium_metadata_keys: Vec<String>,
}

impl Default for PremiumFeaturePolicy {
    fn default() -> Self {
        Self {
            premium_studio_types: BTreeSet::from([StudioType::Voiceover]),
            fallback_studio_type: StudioType::Home,
            premium_metadata_keys: vec!["custom_meta_title".to_string()],
        }
    }
}

impl PremiumFeaturePolicy {
    /// Tag set a listing should have after a downgrade, or `None` if unchanged
    pub fn downgraded_studio_types(
        &self,
        current: &BTreeSet<StudioType>,
    ) -> Option<BTreeSet<StudioType>> {
        if current.is_disjoint(&self.premium_studio_types) {
            return None;
        }

        let mut kept: BTreeSet<StudioType> = current
            .difference(&self.premium_studio_types)
            .copied()
            .collect();
        if kept.is_empty() {
            kept.insert(self.fallback_studio_type);
        }
        Some(kept)
    }
}

/// Everything the reconciler needs to know about policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnforcementPolicy {
    pub admins: AdminAllowlist,
    pub premium_features: PremiumFeaturePolicy,
}

impl EnforcementPolicy {
    pub fn new(admins: AdminAllowlist) -> Self {
        Self {
            admins,
            premium_features: PremiumFeaturePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowlist_is_case_and_whitespace_insensitive() {
        let admins = AdminAllowlist::from_csv(" Owner@Studio.example , ,ops@studio.example");
        assert_eq!(admins.len(), 2);
        assert!(admins.contains("owner@studio.example"));
        assert!(admins.contains("OPS@STUDIO.EXAMPLE "));
        assert!(!admins.contains("someone@studio.example"));
    }

    #[test]
    fn test_empty_allowlist() {
        let admins = AdminAllowlist::from_csv("");
        assert!(admins.is_empty());
        assert!(!admins.contains(""));
    }

    #[test]
    fn test_downgrade_removes_premium_tag_and_keeps_others() {
        let policy = PremiumFeaturePolicy::default();
        let current = BTreeSet::from([StudioType::Voiceover, StudioType::Recording]);
        assert_eq!(
            policy.downgraded_studio_types(&current),
            Some(BTreeSet::from([StudioType::Recording]))
        );
    }

    #[test]
    fn test_downgrade_falls_back_when_no_tags_remain() {
        let policy = PremiumFeaturePolicy::default();
        let current = BTreeSet::from([StudioType::Voiceover]);
        assert_eq!(
            policy.downgraded_studio_types(&current),
            Some(BTreeSet::from([StudioType::Home]))
        );
    }

    #[test]
    fn test_downgrade_leaves_free_tags_untouched() {
        let policy = PremiumFeaturePolicy::default();
        let current = BTreeSet::from([StudioType::Home, StudioType::Podcast]);
        assert_eq!(policy.downgraded_studio_types(&current), None);
    }
}
