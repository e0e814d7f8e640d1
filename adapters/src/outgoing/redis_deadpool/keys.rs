use domain::restriction::RestrictionCategory;

#[derive(Clone)]
pub struct RedisKeyBuilder {
    restriction_namespace: String,
}

impl RedisKeyBuilder {
    pub fn new(environment: &str) -> Self {
        let root_namespace = "warden";
        Self {
            restriction_namespace: format!("{}:{}:restrictions:v1", root_namespace, environment),
        }
    }

    /// Hash holding every entry of one category, field = `"<subject>,<scope>"`.
    pub fn restriction_hash(&self, category: RestrictionCategory) -> String {
        format!("{}:{}", self.restriction_namespace, category.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_keys_are_namespaced_per_environment_and_category() {
        let keys = RedisKeyBuilder::new("production");

        assert_eq!(
            keys.restriction_hash(RestrictionCategory::Mute),
            "warden:production:restrictions:v1:mute"
        );
        assert_eq!(
            keys.restriction_hash(RestrictionCategory::Ban),
            "warden:production:restrictions:v1:ban"
        );
    }
}
