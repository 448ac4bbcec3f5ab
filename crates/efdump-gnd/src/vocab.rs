//! GND vocabulary: identifier prefix, well-known predicates and the
//! entity-class allow-list.
//!
//! Dumps exist with both `http://` and `https://` IRIs; every lookup here
//! accepts either scheme and reports the canonical `http://` form.

use std::sync::LazyLock;

use rustc_hash::FxHashMap;

/// Prefix stripped from subject IRIs to get the bare identifier
pub const GND_PREFIX: &str = "http://d-nb.info/gnd/";

const GND_PREFIX_HTTPS: &str = "https://d-nb.info/gnd/";

/// `rdf:type`
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Links a primary record to an identifier it superseded
pub const DEPRECATED_URI: &str = "http://d-nb.info/standards/elementset/dnb#deprecatedUri";

const DEPRECATED_URI_HTTPS: &str = "https://d-nb.info/standards/elementset/dnb#deprecatedUri";

/// GND ontology namespace
pub const GND_NS: &str = "http://d-nb.info/standards/elementset/gnd#";

const GND_NS_HTTPS: &str = "https://d-nb.info/standards/elementset/gnd#";

macro_rules! gnd_class {
    ($name:literal) => {
        concat!("http://d-nb.info/standards/elementset/gnd#", $name)
    };
}

/// Entity classes whose records are fetched or redirected.
///
/// Person, corporate body, family and place, each with its subclasses.
pub const ALLOWED_ENTITY_TYPES: &[&str] = &[
    gnd_class!("DifferentiatedPerson"),
    gnd_class!("CollectivePseudonym"),
    gnd_class!("Gods"),
    gnd_class!("LiteraryOrLegendaryCharacter"),
    gnd_class!("Pseudonym"),
    gnd_class!("RoyalOrMemberOfARoyalHouse"),
    gnd_class!("Spirits"),
    gnd_class!("CorporateBody"),
    gnd_class!("Company"),
    gnd_class!("FictiveCorporateBody"),
    gnd_class!("MusicalCorporateBody"),
    gnd_class!("OrganOfCorporateBody"),
    gnd_class!("ProjectOrProgram"),
    gnd_class!("ReligiousAdministrativeUnit"),
    gnd_class!("ReligiousCorporateBody"),
    gnd_class!("Family"),
    gnd_class!("PlaceOrGeographicName"),
    gnd_class!("AdministrativeUnit"),
    gnd_class!("BuildingOrMemorial"),
    gnd_class!("Country"),
    gnd_class!("ExtraterrestrialTerritory"),
    gnd_class!("FictivePlace"),
    gnd_class!("MemberState"),
    gnd_class!("NameOfSmallGeographicUnitLyingWithinAnotherGeographicUnit"),
    gnd_class!("NaturalGeographicUnit"),
    gnd_class!("ReligiousTerritory"),
    gnd_class!("TerritorialCorporateBodyOrAdministrativeUnit"),
    gnd_class!("WayBorderOrLine"),
];

/// Local name → canonical class IRI
static BY_LOCAL_NAME: LazyLock<FxHashMap<&'static str, &'static str>> = LazyLock::new(|| {
    ALLOWED_ENTITY_TYPES
        .iter()
        .map(|iri| (&iri[GND_NS.len()..], *iri))
        .collect()
});

/// Canonical IRI of an allowed class, or `None`.
///
/// Matches the exact class only; superclasses are not inferred.
pub fn allowed_class(iri: &str) -> Option<&'static str> {
    let local = iri
        .strip_prefix(GND_NS)
        .or_else(|| iri.strip_prefix(GND_NS_HTTPS))?;
    BY_LOCAL_NAME.get(local).copied()
}

pub fn is_allowed_class(iri: &str) -> bool {
    allowed_class(iri).is_some()
}

pub fn is_type_predicate(iri: &str) -> bool {
    iri == RDF_TYPE
}

pub fn is_deprecated_predicate(iri: &str) -> bool {
    iri == DEPRECATED_URI || iri == DEPRECATED_URI_HTTPS
}

/// Short label for a class IRI (`...gnd#Family` → `Family`)
pub fn class_label(iri: &str) -> &str {
    iri.rsplit_once('#').map_or(iri, |(_, local)| local)
}

/// Bare identifier from a GND IRI or literal.
///
/// Removes quote characters, surrounding whitespace and the GND prefix.
/// Values without the prefix are returned cleaned but otherwise unchanged.
pub fn strip_identifier(value: &str) -> String {
    let unquoted: String;
    let value = if value.contains('"') {
        unquoted = value.replace('"', "");
        unquoted.as_str()
    } else {
        value
    };
    let value = value.trim();
    value
        .strip_prefix(GND_PREFIX)
        .or_else(|| value.strip_prefix(GND_PREFIX_HTTPS))
        .unwrap_or(value)
        .to_string()
}
