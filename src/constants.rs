// -
// URL parameter keys

pub const GROUP_KEY: &str = "group";
pub const CATEGORY_KEY: &str = "category";
pub const DYNAMIC_KEY: &str = "dynamic";
pub const CHECK_KEY: &str = "check";
pub const INTERFACE_KEY: &str = "interface";
pub const VERSION_KEY: &str = "version";
pub const CLASSIFIER_KEY: &str = "classifier";
pub const ENABLED_KEY: &str = "enabled";
pub const ANYHOST_KEY: &str = "anyhost";
pub const BACKUP_KEY: &str = "backup";

// -
// Values

pub const ANY_VALUE: &str = "*";
pub const ANYHOST_VALUE: &str = "0.0.0.0";
pub const REMOVE_VALUE_PREFIX: &str = "-";
pub const EMPTY_PROTOCOL: &str = "empty";
pub const PROTOCOL_SEPARATOR: &str = "://";

/// Root node used when the registry url carries no `group`
pub const DEFAULT_ROOT: &str = "dubbo";

/// Port appended to coordination addresses that do not name one
pub const DEFAULT_REGISTRY_PORT: u16 = 2181;

// -
// Categories

pub const PROVIDERS_CATEGORY: &str = "providers";
pub const CONSUMERS_CATEGORY: &str = "consumers";
pub const ROUTERS_CATEGORY: &str = "routers";
pub const CONFIGURATORS_CATEGORY: &str = "configurators";

pub const DEFAULT_CATEGORY: &str = PROVIDERS_CATEGORY;

/// Expansion order for `category=*`
pub const ALL_CATEGORIES: [&str; 4] = [
    PROVIDERS_CATEGORY,
    CONSUMERS_CATEGORY,
    ROUTERS_CATEGORY,
    CONFIGURATORS_CATEGORY,
];
