use std::fmt;
use std::str::FromStr;

/// Native capture API to try when opening a camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureBackend {
    /// Let the capture library pick.
    #[default]
    Any,
    DirectShow,
    MediaFoundation,
    V4l2,
    AvFoundation,
    GStreamer,
    Ffmpeg,
}

impl CaptureBackend {
    pub const ALL: [CaptureBackend; 7] = [
        CaptureBackend::Any,
        CaptureBackend::DirectShow,
        CaptureBackend::MediaFoundation,
        CaptureBackend::V4l2,
        CaptureBackend::AvFoundation,
        CaptureBackend::GStreamer,
        CaptureBackend::Ffmpeg,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CaptureBackend::Any => "any",
            CaptureBackend::DirectShow => "dshow",
            CaptureBackend::MediaFoundation => "msmf",
            CaptureBackend::V4l2 => "v4l2",
            CaptureBackend::AvFoundation => "avfoundation",
            CaptureBackend::GStreamer => "gstreamer",
            CaptureBackend::Ffmpeg => "ffmpeg",
        }
    }
}

impl fmt::Display for CaptureBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CaptureBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        match wanted.as_str() {
            "directshow" => return Ok(CaptureBackend::DirectShow),
            "mediafoundation" => return Ok(CaptureBackend::MediaFoundation),
            "v4l" => return Ok(CaptureBackend::V4l2),
            _ => {}
        }
        CaptureBackend::ALL
            .into_iter()
            .find(|b| b.name() == wanted)
            .ok_or_else(|| format!("unknown capture backend '{s}'"))
    }
}
