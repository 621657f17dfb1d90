use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of user intent categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    Inversionista,
    Estudiante,
    Gobierno,
    Startup,
    General,
    Contacto,
    Ciudadano,
}

impl Intent {
    /// Every intent, in declaration order.
    pub const ALL: [Intent; 7] = [
        Intent::Inversionista,
        Intent::Estudiante,
        Intent::Gobierno,
        Intent::Startup,
        Intent::General,
        Intent::Contacto,
        Intent::Ciudadano,
    ];

    /// Parse a label leniently. Unknown labels map to [`Intent::General`].
    pub fn parse(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "INVERSIONISTA" => Intent::Inversionista,
            "ESTUDIANTE" => Intent::Estudiante,
            "GOBIERNO" => Intent::Gobierno,
            "STARTUP" => Intent::Startup,
            "CONTACTO" => Intent::Contacto,
            "CIUDADANO" => Intent::Ciudadano,
            _ => Intent::General,
        }
    }

    /// Wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Inversionista => "INVERSIONISTA",
            Intent::Estudiante => "ESTUDIANTE",
            Intent::Gobierno => "GOBIERNO",
            Intent::Startup => "STARTUP",
            Intent::General => "GENERAL",
            Intent::Contacto => "CONTACTO",
            Intent::Ciudadano => "CIUDADANO",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_lenient() {
        assert_eq!(Intent::parse(" estudiante "), Intent::Estudiante);
        assert_eq!(Intent::parse("CIUDADANO"), Intent::Ciudadano);
        assert_eq!(Intent::parse("ALIEN"), Intent::General);
        assert_eq!(Intent::parse(""), Intent::General);
    }

    #[test]
    fn test_labels_roundtrip() {
        for intent in Intent::ALL {
            assert_eq!(Intent::parse(intent.as_str()), intent);
            let json = serde_json::to_string(&intent).unwrap();
            assert_eq!(json, format!("\"{}\"", intent.as_str()));
        }
    }
}
