use std::fmt;
use std::str::FromStr;

/// Which detector is selected. Exactly one value holds at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DetectorKind {
    #[default]
    None = 0,
    Haar = 1,
    Lbp = 2,
    Neural = 3,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 4] = [
        DetectorKind::None,
        DetectorKind::Haar,
        DetectorKind::Lbp,
        DetectorKind::Neural,
    ];

    pub fn is_cascade(self) -> bool {
        matches!(self, DetectorKind::Haar | DetectorKind::Lbp)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => DetectorKind::Haar,
            2 => DetectorKind::Lbp,
            3 => DetectorKind::Neural,
            _ => DetectorKind::None,
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectorKind::None => "none",
            DetectorKind::Haar => "haar",
            DetectorKind::Lbp => "lbp",
            DetectorKind::Neural => "neural",
        };
        f.write_str(name)
    }
}

impl FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(DetectorKind::None),
            "haar" => Ok(DetectorKind::Haar),
            "lbp" => Ok(DetectorKind::Lbp),
            "neural" | "yunet" | "dnn" => Ok(DetectorKind::Neural),
            other => Err(format!(
                "unknown detector '{other}' (expected none, haar, lbp or neural)"
            )),
        }
    }
}
