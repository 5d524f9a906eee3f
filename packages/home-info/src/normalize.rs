//! Address normalization.
//!
//! Turns free-form address input into an [`AddressKey`] (the cache identity)
//! and a display-cased search query. Case, whitespace, punctuation, street
//! suffix spellings, directional spellings and state names are folded.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{LookupError, Result};
use crate::types::address::{AddressInput, AddressKey, NormalizedAddress};

lazy_static! {
    // ZIP or ZIP+4
    static ref ZIP_REGEX: Regex = Regex::new(r"^(\d{5})(?:-(\d{4}))?$").unwrap();

    // Trailing "IL", "IL 62704" or "New York 10001" of a single-line address
    static ref STATE_ZIP_REGEX: Regex =
        Regex::new(r"^(?i)([a-z]+(?:\s+[a-z]+)*)(?:\s+(\d{5}(?:-\d{4})?))?$").unwrap();
}

/// Normalize an address into its cache key and search query.
pub fn normalize(input: &AddressInput) -> Result<NormalizedAddress> {
    let input = split_single_line(input);

    let mut tokens = tokenize(&input.address);
    if tokens.is_empty() {
        return Err(LookupError::malformed(
            "street line has no alphanumeric content",
        ));
    }

    let unit = split_unit(&mut tokens);

    if !tokens[0].starts_with(|c: char| c.is_ascii_digit()) {
        return Err(LookupError::malformed(
            "street line must start with a house number",
        ));
    }
    if tokens.len() < 2 {
        return Err(LookupError::malformed("street line has no street name"));
    }

    let street = fold_street(tokens);

    let city = input
        .city
        .as_deref()
        .map(tokenize)
        .filter(|t| !t.is_empty())
        .map(|t| t.join(" "));

    let state = input
        .state
        .as_deref()
        .map(tokenize)
        .filter(|t| !t.is_empty())
        .map(|t| fold_state(&t.join(" ")));

    let zip = match input.zip_code.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_zip(raw)?),
    };

    let key = AddressKey {
        street: street.join(" "),
        unit,
        city,
        state,
        zip: zip.as_ref().map(|(five, _)| five.clone()),
    };
    let query = display_query(&key, zip.as_ref().map(|(_, full)| full.as_str()));

    Ok(NormalizedAddress { key, query })
}

/// Split "123 Main St, Springfield, IL 62704" into components when the
/// caller supplied the whole address on one line.
fn split_single_line(input: &AddressInput) -> AddressInput {
    if input.city.is_some() || input.state.is_some() || input.zip_code.is_some() {
        return input.clone();
    }

    let parts: Vec<&str> = input
        .address
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 2 {
        return input.clone();
    }

    let mut split = AddressInput::new(parts[0]);
    let mut rest = &parts[1..];

    let state_zip = rest
        .last()
        .and_then(|last| STATE_ZIP_REGEX.captures(last))
        .filter(|caps| caps.get(1).is_some_and(|m| is_state(m.as_str())));
    if let Some(caps) = state_zip {
        if rest.len() > 1 || caps.get(2).is_some() {
            split.state = caps.get(1).map(|m| m.as_str().to_string());
            split.zip_code = caps.get(2).map(|m| m.as_str().to_string());
            rest = &rest[..rest.len() - 1];
        }
    }
    if !rest.is_empty() {
        split.city = Some(rest.join(" "));
    }
    split
}

/// Tokens of free text (a URL slug, a page title) folded the way a street
/// line is. Used to compare listing candidates against a key.
pub(crate) fn street_like_tokens(raw: &str) -> Vec<String> {
    fold_street(tokenize(raw))
}

/// Fold every token after the house number.
fn fold_street(tokens: Vec<String>) -> Vec<String> {
    tokens
        .into_iter()
        .enumerate()
        .map(|(i, t)| if i == 0 { t } else { fold_street_token(&t) })
        .collect()
}

/// Lowercase alphanumeric tokens; `#` is kept as its own token.
fn tokenize(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in raw.chars() {
        if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if c == '#' {
            tokens.push("#".to_string());
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn is_unit_designator(token: &str) -> bool {
    matches!(
        token,
        "#" | "apt"
            | "apartment"
            | "unit"
            | "ste"
            | "suite"
            | "rm"
            | "room"
            | "fl"
            | "floor"
            | "bldg"
            | "building"
    )
}

/// Remove a trailing unit clause from the street tokens.
///
/// Returns the unit identifier ("4" for "Apt 4", "#4" or "Unit #4"). A
/// designator needs a house number and a street name before it.
fn split_unit(tokens: &mut Vec<String>) -> Option<String> {
    let pos = tokens
        .iter()
        .enumerate()
        .skip(2)
        .find(|(_, t)| is_unit_designator(t))
        .map(|(i, _)| i)?;

    let identifier: Vec<String> = tokens
        .drain(pos..)
        .skip(1)
        .filter(|t| !is_unit_designator(t))
        .collect();

    (!identifier.is_empty()).then(|| identifier.join(" "))
}

/// Fold a street-name token to its USPS abbreviation.
fn fold_street_token(token: &str) -> String {
    let folded = match token {
        "street" | "str" => "st",
        "avenue" | "av" | "aven" => "ave",
        "boulevard" | "boul" => "blvd",
        "road" => "rd",
        "drive" | "drv" => "dr",
        "lane" => "ln",
        "court" => "ct",
        "circle" | "circ" => "cir",
        "place" => "pl",
        "terrace" => "ter",
        "parkway" | "pkway" => "pkwy",
        "highway" | "hiway" => "hwy",
        "square" => "sq",
        "trail" => "trl",
        "expressway" => "expy",
        "freeway" => "fwy",
        "crossing" => "xing",
        "point" => "pt",
        "heights" => "hts",
        "alley" => "aly",
        "center" | "centre" => "ctr",
        "crescent" => "cres",
        "junction" => "jct",
        "plaza" => "plz",
        "route" => "rte",
        "north" => "n",
        "south" => "s",
        "east" => "e",
        "west" => "w",
        "northeast" => "ne",
        "northwest" => "nw",
        "southeast" => "se",
        "southwest" => "sw",
        other => other,
    };
    folded.to_string()
}

fn fold_state(state: &str) -> String {
    let code = match state {
        "alabama" => "al",
        "alaska" => "ak",
        "arizona" => "az",
        "arkansas" => "ar",
        "california" => "ca",
        "colorado" => "co",
        "connecticut" => "ct",
        "delaware" => "de",
        "district of columbia" => "dc",
        "florida" => "fl",
        "georgia" => "ga",
        "hawaii" => "hi",
        "idaho" => "id",
        "illinois" => "il",
        "indiana" => "in",
        "iowa" => "ia",
        "kansas" => "ks",
        "kentucky" => "ky",
        "louisiana" => "la",
        "maine" => "me",
        "maryland" => "md",
        "massachusetts" => "ma",
        "michigan" => "mi",
        "minnesota" => "mn",
        "mississippi" => "ms",
        "missouri" => "mo",
        "montana" => "mt",
        "nebraska" => "ne",
        "nevada" => "nv",
        "new hampshire" => "nh",
        "new jersey" => "nj",
        "new mexico" => "nm",
        "new york" => "ny",
        "north carolina" => "nc",
        "north dakota" => "nd",
        "ohio" => "oh",
        "oklahoma" => "ok",
        "oregon" => "or",
        "pennsylvania" => "pa",
        "rhode island" => "ri",
        "south carolina" => "sc",
        "south dakota" => "sd",
        "tennessee" => "tn",
        "texas" => "tx",
        "utah" => "ut",
        "vermont" => "vt",
        "virginia" => "va",
        "washington" => "wa",
        "west virginia" => "wv",
        "wisconsin" => "wi",
        "wyoming" => "wy",
        other => other,
    };
    code.to_string()
}

/// A two-letter code or a full state name.
fn is_state(raw: &str) -> bool {
    let name = tokenize(raw).join(" ");
    name.len() == 2 || fold_state(&name) != name
}

/// Parse a zip into (five-digit key part, full display form).
fn parse_zip(raw: &str) -> Result<(String, String)> {
    let caps = ZIP_REGEX.captures(raw).ok_or_else(|| {
        LookupError::malformed(format!("zip code must be NNNNN or NNNNN-NNNN, got {:?}", raw))
    })?;
    let five = caps
        .get(1)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Ok((five, raw.to_string()))
}

fn is_directional(token: &str) -> bool {
    matches!(token, "n" | "s" | "e" | "w" | "ne" | "nw" | "se" | "sw")
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn display_words(part: &str) -> String {
    part.split(' ')
        .map(|t| {
            if is_directional(t) {
                t.to_uppercase()
            } else {
                capitalize(t)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// "123 Main St Unit 4, Springfield, IL 62704"
fn display_query(key: &AddressKey, zip: Option<&str>) -> String {
    let mut query = display_words(&key.street);
    if let Some(unit) = &key.unit {
        query.push_str(" Unit ");
        query.push_str(&unit.to_uppercase());
    }
    if let Some(city) = &key.city {
        query.push_str(", ");
        query.push_str(&display_words(city));
    }
    if let Some(state) = &key.state {
        query.push_str(", ");
        if state.len() == 2 {
            query.push_str(&state.to_uppercase());
        } else {
            query.push_str(&display_words(state));
        }
    }
    if let Some(zip) = zip {
        query.push(' ');
        query.push_str(zip);
    }
    query
}
