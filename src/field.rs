/// A named piece of bar content produced by one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Clock,
    Battery,
    Workspaces,
    Window,
    Stdin,
}

impl Field {
    /// True for fields fed by the Hyprland event stream.
    pub fn is_hyprland(self) -> bool {
        matches!(self, Self::Workspaces | Self::Window)
    }
}

impl std::str::FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "clock" => Ok(Self::Clock),
            "battery" => Ok(Self::Battery),
            "workspaces" => Ok(Self::Workspaces),
            "window" => Ok(Self::Window),
            "stdin" => Ok(Self::Stdin),
            _ => Err(format!("Unknown field: {}", s)),
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clock => write!(f, "clock"),
            Self::Battery => write!(f, "battery"),
            Self::Workspaces => write!(f, "workspaces"),
            Self::Window => write!(f, "window"),
            Self::Stdin => write!(f, "stdin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_display_name() {
        for field in [
            Field::Clock,
            Field::Battery,
            Field::Workspaces,
            Field::Window,
            Field::Stdin,
        ] {
            assert_eq!(field.to_string().parse::<Field>(), Ok(field));
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            "volume".parse::<Field>(),
            Err("Unknown field: volume".to_string())
        );
    }
}
