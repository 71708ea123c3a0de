//! Reference data for the classifier: software signatures, panel names and
//! UI element names.
//!
//! All phrases are lowercase. Declaration order matters: it breaks score ties
//! between signatures and fixes the order of reported panels and elements.

/// Keywords diagnostic of one creative application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareSignature {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
}

impl SoftwareSignature {
    pub const fn new(name: &'static str, keywords: &'static [&'static str]) -> Self {
        Self { name, keywords }
    }
}

/// The full set of reference data the classifier matches against.
#[derive(Debug, Clone, Copy)]
pub struct Catalogue {
    pub signatures: &'static [SoftwareSignature],
    pub panels: &'static [&'static str],
    pub elements: &'static [&'static str],
}

impl Catalogue {
    pub const fn new(
        signatures: &'static [SoftwareSignature],
        panels: &'static [&'static str],
        elements: &'static [&'static str],
    ) -> Self {
        Self {
            signatures,
            panels,
            elements,
        }
    }

    /// The built-in catalogue of creative applications.
    pub fn builtin() -> &'static Catalogue {
        &BUILTIN
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        BUILTIN
    }
}

static BUILTIN: Catalogue = Catalogue::new(SIGNATURES, PANELS, ELEMENTS);

const SIGNATURES: &[SoftwareSignature] = &[
    SoftwareSignature::new(
        "Adobe Premiere Pro",
        &[
            "premiere",
            "timeline",
            "lumetri color",
            "essential graphics",
            "sequence",
        ],
    ),
    SoftwareSignature::new(
        "Adobe Photoshop",
        &["photoshop", "layers", "brush", "adjustments", "history"],
    ),
    SoftwareSignature::new(
        "Adobe After Effects",
        &[
            "after effects",
            "composition",
            "keyframe",
            "effect controls",
            "render queue",
        ],
    ),
    SoftwareSignature::new(
        "Adobe Illustrator",
        &["illustrator", "artboard", "pathfinder", "stroke", "swatches"],
    ),
    SoftwareSignature::new(
        "DaVinci Resolve",
        &["davinci", "resolve", "fusion", "fairlight", "color page", "timeline"],
    ),
    SoftwareSignature::new(
        "Final Cut Pro",
        &["final cut", "magnetic timeline", "event browser", "inspector", "library"],
    ),
    SoftwareSignature::new(
        "Adobe Audition",
        &["audition", "waveform", "spectral", "multitrack", "effects rack"],
    ),
    SoftwareSignature::new(
        "Ableton Live",
        &["ableton", "session view", "arrangement", "clip", "warp"],
    ),
    SoftwareSignature::new(
        "Logic Pro",
        &["logic pro", "tracks", "mixer", "piano roll", "smart controls"],
    ),
    SoftwareSignature::new(
        "Blender",
        &["blender", "viewport", "outliner", "modifier", "shader editor"],
    ),
    SoftwareSignature::new(
        "Figma",
        &["figma", "frame", "auto layout", "components", "prototype"],
    ),
];

const PANELS: &[&str] = &[
    "timeline",
    "project",
    "effects",
    "effect controls",
    "essential graphics",
    "lumetri color",
    "layers",
    "history",
    "properties",
    "adjustments",
    "swatches",
    "inspector",
    "media pool",
    "mixer",
    "browser",
    "outliner",
    "viewport",
    "render queue",
];

const ELEMENTS: &[&str] = &[
    "play",
    "pause",
    "record",
    "export",
    "render",
    "brush",
    "eraser",
    "pen tool",
    "selection tool",
    "zoom",
    "crop",
    "opacity",
    "blend mode",
    "keyframe",
    "marker",
    "volume",
    "undo",
    "redo",
];
