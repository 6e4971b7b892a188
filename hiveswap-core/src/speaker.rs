//! Speaker names for conversation lines.

use std::borrow::Cow;

/// Indexed by the `SpeakerId` a conversation line carries.
const SPEAKERS: &[&str] = &[
    "NONE",
    "JOEY",
    "XEFROS",
    "CHARUN",
    "ZEBEDE",
    "MARSTI",
    "SKYLLA",
    "DIEMEN",
    "KUPRUM",
    "FOLYKL",
    "CIRAVA",
    "POLYPA",
    "BOLDIR",
    "AZDAJA",
    "KONYYL",
    "DARAYA",
    "LANQUE",
    "LYNERA",
    "BRONYA",
    "WANSHI",
    "STELSA",
    "TYZIAS",
    "REMELE",
    "ELWURD",
    "MALLEK",
    "ARDATA",
    "ZEBRUH",
    "NIHKEE",
    "AMISIA",
    "GALEKH",
    "FOZZER",
    "CHIXIE",
    "IDARAT",
    "DOCKGAL",
    "LEGLESS",
    "VIKARE",
    "FIAMET",
    "CRIDEA",
    "BARZUM",
    "BAIZLI",
    "CHAHUT",
    "KARAKO",
    "BARZUM_AND_BAIZLI",
    "BYERS",
    "TRIZZA",
];

/// Name for a speaker id; ids past the table render as `SPEAKER_<n>`.
pub fn speaker_name(id: i64) -> Cow<'static, str> {
    usize::try_from(id)
        .ok()
        .and_then(|index| SPEAKERS.get(index))
        .map(|name| Cow::Borrowed(*name))
        .unwrap_or_else(|| Cow::Owned(format!("SPEAKER_{id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_speakers() {
        assert_eq!(speaker_name(0), "NONE");
        assert_eq!(speaker_name(1), "JOEY");
        assert_eq!(speaker_name(44), "TRIZZA");
    }

    #[test]
    fn test_unknown_speakers() {
        assert_eq!(speaker_name(45), "SPEAKER_45");
        assert_eq!(speaker_name(-1), "SPEAKER_-1");
    }
}
