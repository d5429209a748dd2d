//! Tracking scenarios for the simulator.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// SIM-001: Device on a table; jitter must not add distance
    Stationary,

    /// SIM-002: Straight walk under open sky
    Walk,

    /// SIM-003: Straight drive under open sky
    Drive,

    /// SIM-004: Walk whose middle third runs through an urban canyon
    UrbanCanyon,

    /// SIM-005: Drive whose middle third has no fix at all
    Tunnel,

    /// SIM-006: Walk paused for its middle third
    PauseResume,

    /// SIM-007: Location permission revoked halfway through a walk
    PermissionRevoked,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Stationary,
            ScenarioId::Walk,
            ScenarioId::Drive,
            ScenarioId::UrbanCanyon,
            ScenarioId::Tunnel,
            ScenarioId::PauseResume,
            ScenarioId::PermissionRevoked,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Stationary => "stationary",
            ScenarioId::Walk => "walk",
            ScenarioId::Drive => "drive",
            ScenarioId::UrbanCanyon => "urban_canyon",
            ScenarioId::Tunnel => "tunnel",
            ScenarioId::PauseResume => "pause_resume",
            ScenarioId::PermissionRevoked => "permission_revoked",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Stationary => "Stationary device with mixed accuracy, distance must stay near zero",
            ScenarioId::Walk => "1.4 m/s straight walk, 5 m accuracy",
            ScenarioId::Drive => "15 m/s straight drive, 8 m accuracy",
            ScenarioId::UrbanCanyon => "Walk degrading to 40 m accuracy mid-route",
            ScenarioId::Tunnel => "Drive losing the fix entirely mid-route",
            ScenarioId::PauseResume => "Walk paused mid-route, paused fixes discarded",
            ScenarioId::PermissionRevoked => "Walk whose location permission is revoked halfway",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stationary" | "sim-001" => Ok(ScenarioId::Stationary),
            "walk" | "sim-002" => Ok(ScenarioId::Walk),
            "drive" | "sim-003" => Ok(ScenarioId::Drive),
            "urban_canyon" | "urbancanyon" | "sim-004" => Ok(ScenarioId::UrbanCanyon),
            "tunnel" | "sim-005" => Ok(ScenarioId::Tunnel),
            "pause_resume" | "pauseresume" | "sim-006" => Ok(ScenarioId::PauseResume),
            "permission_revoked" | "permissionrevoked" | "sim-007" => {
                Ok(ScenarioId::PermissionRevoked)
            }
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
    }

    #[test]
    fn test_aliases_and_unknown() {
        assert_eq!("SIM-005".parse::<ScenarioId>(), Ok(ScenarioId::Tunnel));
        assert_eq!("UrbanCanyon".parse::<ScenarioId>(), Ok(ScenarioId::UrbanCanyon));
        assert!("moonwalk".parse::<ScenarioId>().is_err());
    }
}
