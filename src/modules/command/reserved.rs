use std::collections::HashSet;

/// 内置处理器使用的命令名
/// Names taken by the bot's built-in handlers
const BUILTIN: &[&str] = &[
    "addcommand",
    "admin",
    "ban",
    "commands",
    "del",
    "getwarns",
    "groups",
    "help",
    "leave",
    "link",
    "nowarns",
    "removecommand",
    "report",
    "settings",
    "staff",
    "start",
    "unadmin",
    "unban",
    "unwarn",
    "user",
    "warn",
];

/// 保留命令名，永远不能作为用户自定义命令
/// Reserved names that are never accepted as user-defined commands
#[derive(Debug, Clone, Default)]
pub struct ReservedNames {
    names: HashSet<String>,
}

impl ReservedNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim_start_matches('/').to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN)
    }

    pub fn extend<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.names.extend(Self::new(names).names);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_and_extra_names() {
        let reserved = ReservedNames::builtin().extend(["/Rules", ""]);
        assert!(reserved.contains("addcommand"));
        assert!(reserved.contains("RULES"));
        assert!(!reserved.contains("faq"));
        assert_eq!(reserved.len(), BUILTIN.len() + 1);
    }
}
