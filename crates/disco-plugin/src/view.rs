use chrono::DateTime;
use disco_core::{Body, BodyFeatures, System};
use std::fmt::Write as _;

const SCOOPABLE_STAR_TYPES: [&str; 7] = ["O", "B", "A", "F", "G", "K", "M"];
const SCAN_NEEDED: &str = "Detailed surface scanning needed.";

pub fn not_found_message(name: &str) -> String {
    format!("System '{name}' not found in local database.")
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyRow {
    pub body_id: u32,
    pub parent_id: u32,
    pub name: String,
    pub is_star: bool,
    pub scoopable: bool,
    pub landable: bool,
    pub distance_ls: Option<u64>,
    pub temperature_k: Option<i64>,
    pub terraform_state: Option<String>,
    pub bio_signals: u32,
    pub geo_signals: u32,
    pub human_signals: u32,
    pub discovered_first: bool,
    pub mapped_first: bool,
    pub summary: Vec<String>,
    pub biology: Vec<String>,
    pub geology: Vec<String>,
}

impl BodyRow {
    pub fn build(system: &System, body: &Body) -> Self {
        let features = &body.features;
        let is_star = features.star_type.is_some();
        let signals = &body.signals;

        let name = if body.is_placeholder() {
            format!("??? id: {}", body.body_id)
        } else if is_star {
            body.name.clone()
        } else {
            short_name(&system.name, &body.name)
        };

        let bio_signals = signals.count_bio_signals();
        let geo_signals = signals.count_geo_signals();

        Self {
            body_id: body.body_id,
            parent_id: body.parent_id,
            name,
            is_star,
            scoopable: features
                .star_type
                .as_deref()
                .is_some_and(|star_type| SCOOPABLE_STAR_TYPES.contains(&star_type)),
            landable: features.landable.unwrap_or(false),
            distance_ls: features.distance_ls.map(|distance| distance as u64),
            temperature_k: features.surface_temperature.map(|kelvin| kelvin as i64),
            terraform_state: features
                .terraform_state
                .clone()
                .filter(|state| !state.is_empty()),
            bio_signals,
            geo_signals,
            human_signals: signals.count_human_signals(),
            discovered_first: features.discovered_first,
            mapped_first: features.mapped_first,
            summary: summary_lines(features),
            biology: if bio_signals > 0 {
                biology_lines(body)
            } else {
                Vec::new()
            },
            geology: if geo_signals > 0 {
                geology_lines(body)
            } else {
                Vec::new()
            },
        }
    }
}

fn short_name(system_name: &str, body_name: &str) -> String {
    if system_name.is_empty() {
        return body_name.to_string();
    }
    let short = body_name.replace(system_name, "");
    let short = short.trim();
    if short.is_empty() {
        body_name.to_string()
    } else {
        short.to_string()
    }
}

fn summary_lines(features: &BodyFeatures) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(star_type) = &features.star_type {
        let subclass = features
            .subclass
            .map(|subclass| subclass.to_string())
            .unwrap_or_default();
        let luminosity = features.luminosity.as_deref().unwrap_or_default();
        lines.push(
            format!("Spectral class: {star_type}{subclass} {luminosity}")
                .trim_end()
                .to_string(),
        );
        if let Some(mass) = features.stellar_mass {
            lines.push(format!("Solar masses: {mass:.3}"));
        }
        if let Some(radius) = features.radius {
            lines.push(format!("Solar radius: {}", radius as i64));
        }
        if let Some(kelvin) = features.surface_temperature {
            lines.push(format!("Surface temperature: {} K", kelvin as i64));
        }
    }

    if features.body_type.as_deref() == Some("Planet") {
        lines.push(format!(
            "Planet class: {}",
            features.planet_class.as_deref().unwrap_or("unknown")
        ));
        if let Some(gravity) = features.surface_gravity {
            lines.push(format!("Gravity: {gravity:.3}"));
        }
        if let Some(mass) = features.mass_em {
            lines.push(format!("Earth mass: {mass:.3}"));
        }
        if let Some(radius) = features.radius {
            lines.push(format!("Radius: {}", radius as i64));
        }
        if let Some(kelvin) = features.surface_temperature {
            lines.push(format!("Surface temp.: {} K", kelvin as i64));
        }
        if let Some(pascal) = features.surface_pressure.filter(|pascal| *pascal > 0.0) {
            lines.push(format!("Surface press.: {} hPa", (pascal / 100.0) as i64));
        }
        if let Some(volcanism) = features.volcanism.as_deref().filter(|text| !text.is_empty()) {
            lines.push(format!("Volcanism: {volcanism}"));
        }
        let atmosphere = features
            .atmosphere
            .as_deref()
            .filter(|text| !text.is_empty())
            .or(features.atmosphere_type.as_deref())
            .unwrap_or("None");
        lines.push(format!("Atmosphere: {atmosphere}"));
        if let Some(state) = features.terraform_state.as_deref().filter(|text| !text.is_empty()) {
            lines.push(format!("Terraforming: {state}"));
        }
    }

    lines
}

fn biology_lines(body: &Body) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(atmosphere) = body.features.atmosphere.as_deref().filter(|text| !text.is_empty()) {
        lines.push(format!("Atmosphere: {atmosphere}"));
    }

    for genus in &body.genuses.entries {
        if genus.scans.is_empty() {
            lines.push(format!("[0]: {}", genus.genus_localised));
            continue;
        }
        for scan in &genus.scans {
            let mut name = if scan.variant_localised.is_empty() {
                scan.species_localised.clone()
            } else {
                scan.variant_localised.clone()
            };
            // A finished species is named by its codex entry, which carries the variant.
            if scan.done && scan.variant_localised.is_empty() {
                if let Some(entry) = body.codexes.entries.iter().find(|entry| {
                    !scan.species_localised.is_empty()
                        && entry.name_localised.contains(&scan.species_localised)
                }) {
                    name = entry.name_localised.clone();
                }
            }
            if scan.done {
                lines.push(name);
            } else {
                lines.push(format!("[{}]: {name}", scan.count));
            }
        }
    }

    if body.genuses.entries.is_empty() {
        lines.push(SCAN_NEEDED.to_string());
    }
    lines
}

fn geology_lines(body: &Body) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(volcanism) = body.features.volcanism.as_deref().filter(|text| !text.is_empty()) {
        lines.push(format!("Features: {volcanism}"));
    }
    for entry in &body.codexes.entries {
        if entry
            .subcategory_localised
            .as_deref()
            .is_some_and(|subcategory| subcategory.contains("Geology"))
        {
            lines.push(entry.display_name().to_string());
        }
    }
    if body.codexes.entries.is_empty() {
        lines.push(SCAN_NEEDED.to_string());
    }
    lines
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemView {
    pub title: String,
    pub security: String,
    pub allegiance: String,
    pub population: u64,
    pub body_count: u32,
    pub discovered: usize,
    pub last_update: String,
    pub rows: Vec<BodyRow>,
}

impl SystemView {
    /// Rows are ordered by body id; `Null` barycentres are left out.
    pub fn build(system: &System) -> Self {
        let mut bodies: Vec<&Body> = system
            .bodies
            .iter()
            .filter(|body| body.features.body_type.as_deref() != Some("Null"))
            .collect();
        bodies.sort_by_key(|body| body.body_id);

        let features = &system.features;
        Self {
            title: format!("{} [{}]", system.name, system.progress()),
            security: features.security.clone().unwrap_or_default(),
            allegiance: features
                .allegiance
                .clone()
                .filter(|allegiance| !allegiance.is_empty())
                .unwrap_or_else(|| "None".to_string()),
            population: features.population,
            body_count: system.body_count,
            discovered: system.scanned_body_count(),
            last_update: format_timestamp(system.last_update),
            rows: bodies
                .into_iter()
                .map(|body| BodyRow::build(system, body))
                .collect(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(
            out,
            "Security: {} | Allegiance: {} | Population: {}",
            self.security, self.allegiance, self.population
        );
        let _ = writeln!(
            out,
            "Body count: {} | Discovered: {} | Last update: {}",
            self.body_count, self.discovered, self.last_update
        );

        for row in &self.rows {
            let distance = row
                .distance_ls
                .map(|distance| format!("{distance} ls"))
                .unwrap_or_default();
            let temperature = row
                .temperature_k
                .map(|kelvin| format!("{kelvin}K"))
                .unwrap_or_default();
            let mut markers = Vec::new();
            if row.scoopable {
                markers.push("scoopable".to_string());
            }
            if row.landable {
                markers.push("landable".to_string());
            }
            if row.terraform_state.is_some() {
                markers.push("terraformable".to_string());
            }
            if row.human_signals > 0 {
                markers.push(format!("human:{}", row.human_signals));
            }
            if row.bio_signals > 0 {
                markers.push(format!("bio:{}", row.bio_signals));
            }
            if row.geo_signals > 0 {
                markers.push(format!("geo:{}", row.geo_signals));
            }
            if row.discovered_first {
                markers.push("first discovered".to_string());
            }
            if row.mapped_first {
                markers.push("first mapped".to_string());
            }

            let line = format!(
                "{:>4}  {:<28} {:>10} {:>7}  {}",
                row.body_id,
                row.name,
                distance,
                temperature,
                markers.join(", ")
            );
            let _ = writeln!(out, "{}", line.trim_end());
            for detail in row.summary.iter().chain(&row.biology).chain(&row.geology) {
                let _ = writeln!(out, "        {detail}");
            }
        }
        out
    }
}

fn format_timestamp(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|datetime| datetime.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use disco_core::{CodexEntry, Genus, GenusScan, Signal};

    fn sample_system() -> System {
        let mut system = System::new(1000);
        system.name = "Test".to_string();
        system.body_count = 4;
        system.last_update = 1_672_531_200;
        system.features.security = Some("High Security".to_string());
        system.features.population = 1200;

        let mut star = Body::new(1);
        star.name = "Test A".to_string();
        star.features.star_type = Some("K".to_string());
        star.features.body_type = Some("Star".to_string());
        star.features.subclass = Some(4);
        star.features.luminosity = Some("Va".to_string());
        star.features.stellar_mass = Some(0.75);
        star.features.discovered_first = true;

        let mut planet = Body::new(5);
        planet.name = "Test A 2".to_string();
        planet.parent_id = 1;
        planet.features.body_type = Some("Planet".to_string());
        planet.features.planet_class = Some("Rocky body".to_string());
        planet.features.landable = Some(true);
        planet.features.distance_ls = Some(512.75);
        planet.features.surface_temperature = Some(180.4);
        planet.features.surface_pressure = Some(12_345.0);
        planet.features.atmosphere = Some("thin ammonia atmosphere".to_string());
        planet.features.mapped_first = true;
        planet.signals.entries.push(Signal {
            signal_type: "$SAA_SignalType_Biological;".to_string(),
            type_localised: Some("Biological".to_string()),
            count: 2,
        });
        planet.genuses.entries.push(Genus {
            genus: "$Codex_Ent_Bacterial_Genus_Name;".to_string(),
            genus_localised: "Bacterium".to_string(),
            scans: vec![GenusScan {
                species_localised: "Bacterium Aurasus".to_string(),
                count: 3,
                done: true,
                ..GenusScan::default()
            }],
        });
        planet.genuses.entries.push(Genus {
            genus: "$Codex_Ent_Stratum_Genus_Name;".to_string(),
            genus_localised: "Stratum".to_string(),
            scans: Vec::new(),
        });
        planet.codexes.entries.push(CodexEntry {
            name: "$Codex_Ent_Bacterial_01_A_Name;".to_string(),
            name_localised: "Bacterium Aurasus - Teal".to_string(),
            ..CodexEntry::default()
        });

        system.bodies = vec![
            planet,
            star,
            Body::placeholder(0, 0, "Null"),
            Body::placeholder(3, 1, "Star"),
        ];
        system
    }

    #[test]
    fn view_orders_rows_and_skips_null_bodies() {
        let view = SystemView::build(&sample_system());

        assert_eq!(view.title, "Test [2/4]");
        assert_eq!(view.allegiance, "None");
        assert_eq!(view.last_update, "2023-01-01 00:00:00");
        let ids: Vec<u32> = view.rows.iter().map(|row| row.body_id).collect();
        assert_eq!(ids, vec![1, 3, 5]);
        assert_eq!(view.rows[1].name, "??? id: 3");
    }

    #[test]
    fn rows_carry_markers_and_tooltips() {
        let view = SystemView::build(&sample_system());
        let star = &view.rows[0];
        assert_eq!(star.name, "Test A");
        assert!(star.scoopable);
        assert!(star.discovered_first);
        assert_eq!(star.summary[0], "Spectral class: K4 Va");
        assert_eq!(star.summary[1], "Solar masses: 0.750");

        let planet = &view.rows[2];
        assert_eq!(planet.name, "A 2");
        assert_eq!(planet.distance_ls, Some(512));
        assert_eq!(planet.temperature_k, Some(180));
        assert!(planet.landable && planet.mapped_first);
        assert!(planet.summary.contains(&"Surface press.: 123 hPa".to_string()));
        assert!(planet
            .summary
            .contains(&"Atmosphere: thin ammonia atmosphere".to_string()));
        assert_eq!(
            planet.biology,
            vec![
                "Atmosphere: thin ammonia atmosphere".to_string(),
                "Bacterium Aurasus - Teal".to_string(),
                "[0]: Stratum".to_string(),
            ]
        );
        assert!(planet.geology.is_empty());
    }

    #[test]
    fn render_text_includes_header_and_rows() {
        let text = SystemView::build(&sample_system()).render_text();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Test [2/4]"));
        assert_eq!(
            lines.next(),
            Some("Security: High Security | Allegiance: None | Population: 1200")
        );
        assert!(text.contains("512 ls"));
        assert!(text.contains("bio:2"));
        assert!(text.contains("first mapped"));
    }

    #[test]
    fn not_found_message_names_the_system() {
        assert_eq!(
            not_found_message("Sol"),
            "System 'Sol' not found in local database."
        );
    }
}
