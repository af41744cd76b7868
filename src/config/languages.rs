//! Static language code table.
//!
//! Maps the three-letter codes produced by the detection heuristic to the
//! Portuguese display labels used in the final post. Codes without an entry
//! are treated as "not found" by the detector.

/// Label used when no language could be identified.
pub const UNKNOWN_LANGUAGE: &str = "desconhecido";

/// Returns the display label for a detector language code, if known.
#[must_use]
pub fn language_label(code: &str) -> Option<&'static str> {
    let label = match code {
        "por" => "Português",
        "eng" => "Inglês",
        "spa" => "Espanhol",
        "fra" => "Francês",
        "deu" => "Alemão",
        "ita" => "Italiano",
        "rus" => "Russo",
        "ukr" => "Ucraniano",
        "ara" => "Árabe",
        "hin" => "Hindi",
        "ind" => "Indonésio",
        "tur" => "Turco",
        "jpn" => "Japonês",
        "kor" => "Coreano",
        "cmn" => "Chinês",
        "nld" => "Holandês",
        "pol" => "Polonês",
        "vie" => "Vietnamita",
        "tha" => "Tailandês",
        "swe" => "Sueco",
        "dan" => "Dinamarquês",
        "fin" => "Finlandês",
        "ell" => "Grego",
        "heb" => "Hebraico",
        "pes" => "Persa",
        "ces" => "Tcheco",
        "ron" => "Romeno",
        "hun" => "Húngaro",
        "urd" => "Urdu",
        "ben" => "Bengali",
        _ => return None,
    };
    Some(label)
}
