use serde::{Deserialize, Serialize};

/// The numeric measurements a station reports. Wind direction is not listed
/// here: it is categorical and cannot carry a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    Temperature,
    Humidity,
    Precipitation,
    WindSpeed,
    PollutionIndex,
    PollenIndex,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Temperature => "temperature",
            MetricName::Humidity => "humidity",
            MetricName::Precipitation => "precipitation",
            MetricName::WindSpeed => "wind_speed",
            MetricName::PollutionIndex => "pollution_index",
            MetricName::PollenIndex => "pollen_index",
        }
    }
}

impl std::fmt::Display for MetricName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temperature" => Ok(MetricName::Temperature),
            "humidity" => Ok(MetricName::Humidity),
            "precipitation" => Ok(MetricName::Precipitation),
            "wind_speed" => Ok(MetricName::WindSpeed),
            "pollution_index" => Ok(MetricName::PollutionIndex),
            "pollen_index" => Ok(MetricName::PollenIndex),
            _ => Err(format!("unknown metric name: {s}")),
        }
    }
}

/// Compass wind direction as reported by the stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl WindDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindDirection::N => "N",
            WindDirection::NE => "NE",
            WindDirection::E => "E",
            WindDirection::SE => "SE",
            WindDirection::S => "S",
            WindDirection::SW => "SW",
            WindDirection::W => "W",
            WindDirection::NW => "NW",
        }
    }
}

impl std::fmt::Display for WindDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WindDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(WindDirection::N),
            "NE" => Ok(WindDirection::NE),
            "E" => Ok(WindDirection::E),
            "SE" => Ok(WindDirection::SE),
            "S" => Ok(WindDirection::S),
            "SW" => Ok(WindDirection::SW),
            "W" => Ok(WindDirection::W),
            "NW" => Ok(WindDirection::NW),
            _ => Err(format!("unknown wind direction: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_name_round_trips_through_str() {
        let all = [
            MetricName::Temperature,
            MetricName::Humidity,
            MetricName::Precipitation,
            MetricName::WindSpeed,
            MetricName::PollutionIndex,
            MetricName::PollenIndex,
        ];
        for m in all {
            assert_eq!(m.as_str().parse::<MetricName>(), Ok(m));
        }
        assert!("visibility".parse::<MetricName>().is_err());
    }

    #[test]
    fn metric_name_serde_uses_snake_case() {
        let json = serde_json::to_string(&MetricName::WindSpeed).unwrap();
        assert_eq!(json, "\"wind_speed\"");
    }

    #[test]
    fn wind_direction_rejects_unknown_points() {
        assert_eq!("NW".parse::<WindDirection>(), Ok(WindDirection::NW));
        assert!("NNW".parse::<WindDirection>().is_err());
    }
}
