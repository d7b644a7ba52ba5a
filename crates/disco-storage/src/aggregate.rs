//! Loading and saving the System aggregate across its tables.

use crate::StorageError;
use disco_core::{
    Body, BodyFeatures, CodexEntry, Genus, GenusScan, Signal, StarPos, System, SystemFeatures,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SYSTEM_SELECT: &str = "
    SELECT s.id, s.system_address, s.name, s.pos_x, s.pos_y, s.pos_z,
           s.body_count, s.non_body_count, s.last_update,
           f.allegiance, f.security, f.population
    FROM systems s
    LEFT JOIN system_features f ON f.system_id = s.id
";

const BODY_SELECT: &str = "
    SELECT b.id, b.body_id, b.parent_id, b.name,
           f.absolute_magnitude, f.atmosphere, f.atmosphere_type, f.axial_tilt,
           f.body_type, f.discovered, f.discovered_first, f.distance_ls,
           f.eccentricity, f.landable, f.luminosity, f.mapped, f.mapped_first,
           f.mass_em, f.orbital_inclination, f.orbital_period, f.periapsis,
           f.planet_class, f.radius, f.rotation_period, f.semi_major_axis,
           f.star_type, f.stellar_mass, f.subclass, f.surface_gravity,
           f.surface_pressure, f.surface_temperature, f.terraform_state, f.volcanism
    FROM bodies b
    LEFT JOIN body_features f ON f.body_id = b.id
    WHERE b.system_id = ?1
    ORDER BY b.id
";

pub(crate) fn load_by_address(
    conn: &Connection,
    system_address: u64,
) -> Result<Option<System>, StorageError> {
    let sql = format!("{SYSTEM_SELECT} WHERE s.system_address = ?1");
    let system = conn
        .query_row(&sql, [system_address as i64], system_from_row)
        .optional()?;
    system.map(|system| with_bodies(conn, system)).transpose()
}

pub(crate) fn load_by_name(conn: &Connection, name: &str) -> Result<Option<System>, StorageError> {
    let sql = format!(
        "{SYSTEM_SELECT} WHERE lower(s.name) = lower(?1) ORDER BY s.last_update DESC, s.id DESC LIMIT 1"
    );
    let system = conn.query_row(&sql, [name], system_from_row).optional()?;
    system.map(|system| with_bodies(conn, system)).transpose()
}

fn system_from_row(row: &Row<'_>) -> rusqlite::Result<System> {
    Ok(System {
        id: Some(row.get(0)?),
        system_address: row.get::<_, i64>(1)? as u64,
        name: row.get(2)?,
        position: StarPos {
            x: row.get(3)?,
            y: row.get(4)?,
            z: row.get(5)?,
        },
        body_count: row.get(6)?,
        non_body_count: row.get(7)?,
        last_update: row.get(8)?,
        features: SystemFeatures {
            allegiance: row.get(9)?,
            security: row.get(10)?,
            population: row.get::<_, Option<i64>>(11)?.unwrap_or(0) as u64,
        },
        bodies: Vec::new(),
    })
}

fn flag(row: &Row<'_>, column: &str) -> rusqlite::Result<bool> {
    Ok(row.get::<_, Option<bool>>(column)?.unwrap_or(false))
}

fn body_from_row(row: &Row<'_>) -> rusqlite::Result<Body> {
    let features = BodyFeatures {
        absolute_magnitude: row.get("absolute_magnitude")?,
        atmosphere: row.get("atmosphere")?,
        atmosphere_type: row.get("atmosphere_type")?,
        axial_tilt: row.get("axial_tilt")?,
        body_type: row.get("body_type")?,
        discovered: flag(row, "discovered")?,
        discovered_first: flag(row, "discovered_first")?,
        distance_ls: row.get("distance_ls")?,
        eccentricity: row.get("eccentricity")?,
        landable: row.get("landable")?,
        luminosity: row.get("luminosity")?,
        mapped: flag(row, "mapped")?,
        mapped_first: flag(row, "mapped_first")?,
        mass_em: row.get("mass_em")?,
        orbital_inclination: row.get("orbital_inclination")?,
        orbital_period: row.get("orbital_period")?,
        periapsis: row.get("periapsis")?,
        planet_class: row.get("planet_class")?,
        radius: row.get("radius")?,
        rotation_period: row.get("rotation_period")?,
        semi_major_axis: row.get("semi_major_axis")?,
        star_type: row.get("star_type")?,
        stellar_mass: row.get("stellar_mass")?,
        subclass: row.get("subclass")?,
        surface_gravity: row.get("surface_gravity")?,
        surface_pressure: row.get("surface_pressure")?,
        surface_temperature: row.get("surface_temperature")?,
        terraform_state: row.get("terraform_state")?,
        volcanism: row.get("volcanism")?,
    };

    Ok(Body {
        id: Some(row.get(0)?),
        body_id: row.get(1)?,
        parent_id: row.get(2)?,
        name: row.get(3)?,
        features,
        ..Body::default()
    })
}

fn with_bodies(conn: &Connection, mut system: System) -> Result<System, StorageError> {
    let Some(system_id) = system.id else {
        return Ok(system);
    };

    let bodies = conn
        .prepare_cached(BODY_SELECT)?
        .query_map([system_id], body_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for mut body in bodies {
        if let Some(row_id) = body.id {
            body.signals.entries = load_signals(conn, row_id)?;
            body.genuses.entries = load_genuses(conn, row_id)?;
            body.codexes.entries = load_codexes(conn, row_id)?;
        }
        system.bodies.push(body);
    }
    Ok(system)
}

fn load_signals(conn: &Connection, body_row: i64) -> Result<Vec<Signal>, StorageError> {
    let signals = conn
        .prepare_cached(
            "
            SELECT signal_type, type_localised, count
            FROM signals
            WHERE body_id = ?1
            ORDER BY id
            ",
        )?
        .query_map([body_row], |row| {
            Ok(Signal {
                signal_type: row.get(0)?,
                type_localised: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(signals)
}

fn load_genuses(conn: &Connection, body_row: i64) -> Result<Vec<Genus>, StorageError> {
    let rows = conn
        .prepare_cached(
            "
            SELECT id, genus, genus_localised
            FROM genuses
            WHERE body_id = ?1
            ORDER BY id
            ",
        )?
        .query_map([body_row], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                Genus {
                    genus: row.get(1)?,
                    genus_localised: row.get(2)?,
                    scans: Vec::new(),
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut genuses = Vec::with_capacity(rows.len());
    for (genus_row, mut genus) in rows {
        genus.scans = conn
            .prepare_cached(
                "
                SELECT species, species_localised, variant, variant_localised, count, done
                FROM genus_scans
                WHERE genus_id = ?1
                ORDER BY id
                ",
            )?
            .query_map([genus_row], |row| {
                Ok(GenusScan {
                    species: row.get(0)?,
                    species_localised: row.get(1)?,
                    variant: row.get(2)?,
                    variant_localised: row.get(3)?,
                    count: row.get(4)?,
                    done: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        genuses.push(genus);
    }
    Ok(genuses)
}

fn load_codexes(conn: &Connection, body_row: i64) -> Result<Vec<CodexEntry>, StorageError> {
    let entries = conn
        .prepare_cached(
            "
            SELECT name, name_localised, category, category_localised,
                   subcategory, subcategory_localised, latitude, longitude
            FROM codex_entries
            WHERE body_id = ?1
            ORDER BY id
            ",
        )?
        .query_map([body_row], |row| {
            Ok(CodexEntry {
                name: row.get(0)?,
                name_localised: row.get(1)?,
                category: row.get(2)?,
                category_localised: row.get(3)?,
                subcategory: row.get(4)?,
                subcategory_localised: row.get(5)?,
                latitude: row.get(6)?,
                longitude: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Upserts every row of the aggregate on its natural key. Rows are never
/// deleted; the aggregate only grows.
pub(crate) fn save(conn: &Connection, system: &mut System) -> Result<(), StorageError> {
    let system_address = system.system_address as i64;
    conn.execute(
        "
        INSERT INTO systems (
            system_address, name, pos_x, pos_y, pos_z,
            body_count, non_body_count, last_update
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(system_address) DO UPDATE SET
            name=excluded.name,
            pos_x=excluded.pos_x,
            pos_y=excluded.pos_y,
            pos_z=excluded.pos_z,
            body_count=excluded.body_count,
            non_body_count=excluded.non_body_count,
            last_update=excluded.last_update
        ",
        params![
            system_address,
            system.name,
            system.position.x,
            system.position.y,
            system.position.z,
            system.body_count,
            system.non_body_count,
            system.last_update,
        ],
    )?;
    let system_id: i64 = conn.query_row(
        "SELECT id FROM systems WHERE system_address = ?1",
        [system_address],
        |row| row.get(0),
    )?;
    system.id = Some(system_id);

    conn.execute(
        "
        INSERT INTO system_features (system_id, allegiance, security, population)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(system_id) DO UPDATE SET
            allegiance=excluded.allegiance,
            security=excluded.security,
            population=excluded.population
        ",
        params![
            system_id,
            system.features.allegiance,
            system.features.security,
            system.features.population as i64,
        ],
    )?;

    for body in &mut system.bodies {
        save_body(conn, system_id, body)?;
    }
    Ok(())
}

fn save_body(conn: &Connection, system_id: i64, body: &mut Body) -> Result<(), StorageError> {
    conn.prepare_cached(
        "
        INSERT INTO bodies (system_id, body_id, parent_id, name)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(system_id, body_id) DO UPDATE SET
            parent_id=excluded.parent_id,
            name=excluded.name
        ",
    )?
    .execute(params![system_id, body.body_id, body.parent_id, body.name])?;
    let body_row: i64 = conn
        .prepare_cached("SELECT id FROM bodies WHERE system_id = ?1 AND body_id = ?2")?
        .query_row(params![system_id, body.body_id], |row| row.get(0))?;
    body.id = Some(body_row);

    save_features(conn, body_row, &body.features)?;

    for signal in &body.signals.entries {
        conn.prepare_cached(
            "
            INSERT INTO signals (body_id, signal_type, type_localised, count)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(body_id, signal_type) DO UPDATE SET
                type_localised=COALESCE(excluded.type_localised, signals.type_localised),
                count=excluded.count
            ",
        )?
        .execute(params![
            body_row,
            signal.signal_type,
            signal.type_localised,
            signal.count
        ])?;
    }

    for genus in &body.genuses.entries {
        save_genus(conn, body_row, genus)?;
    }

    for entry in &body.codexes.entries {
        conn.prepare_cached(
            "
            INSERT INTO codex_entries (
                body_id, name, name_localised, category, category_localised,
                subcategory, subcategory_localised, latitude, longitude
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(body_id, name, name_localised) DO NOTHING
            ",
        )?
        .execute(params![
            body_row,
            entry.name,
            entry.name_localised,
            entry.category,
            entry.category_localised,
            entry.subcategory,
            entry.subcategory_localised,
            entry.latitude,
            entry.longitude,
        ])?;
    }
    Ok(())
}

fn save_features(
    conn: &Connection,
    body_row: i64,
    features: &BodyFeatures,
) -> Result<(), StorageError> {
    conn.prepare_cached(
        "
        INSERT INTO body_features (
            body_id, absolute_magnitude, atmosphere, atmosphere_type, axial_tilt,
            body_type, discovered, discovered_first, distance_ls, eccentricity,
            landable, luminosity, mapped, mapped_first, mass_em,
            orbital_inclination, orbital_period, periapsis, planet_class, radius,
            rotation_period, semi_major_axis, star_type, stellar_mass, subclass,
            surface_gravity, surface_pressure, surface_temperature, terraform_state, volcanism
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
            ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30
        )
        ON CONFLICT(body_id) DO UPDATE SET
            absolute_magnitude=excluded.absolute_magnitude,
            atmosphere=excluded.atmosphere,
            atmosphere_type=excluded.atmosphere_type,
            axial_tilt=excluded.axial_tilt,
            body_type=excluded.body_type,
            discovered=excluded.discovered,
            discovered_first=excluded.discovered_first,
            distance_ls=excluded.distance_ls,
            eccentricity=excluded.eccentricity,
            landable=excluded.landable,
            luminosity=excluded.luminosity,
            mapped=excluded.mapped,
            mapped_first=excluded.mapped_first,
            mass_em=excluded.mass_em,
            orbital_inclination=excluded.orbital_inclination,
            orbital_period=excluded.orbital_period,
            periapsis=excluded.periapsis,
            planet_class=excluded.planet_class,
            radius=excluded.radius,
            rotation_period=excluded.rotation_period,
            semi_major_axis=excluded.semi_major_axis,
            star_type=excluded.star_type,
            stellar_mass=excluded.stellar_mass,
            subclass=excluded.subclass,
            surface_gravity=excluded.surface_gravity,
            surface_pressure=excluded.surface_pressure,
            surface_temperature=excluded.surface_temperature,
            terraform_state=excluded.terraform_state,
            volcanism=excluded.volcanism
        ",
    )?
    .execute(params![
        body_row,
        features.absolute_magnitude,
        features.atmosphere,
        features.atmosphere_type,
        features.axial_tilt,
        features.body_type,
        features.discovered,
        features.discovered_first,
        features.distance_ls,
        features.eccentricity,
        features.landable,
        features.luminosity,
        features.mapped,
        features.mapped_first,
        features.mass_em,
        features.orbital_inclination,
        features.orbital_period,
        features.periapsis,
        features.planet_class,
        features.radius,
        features.rotation_period,
        features.semi_major_axis,
        features.star_type,
        features.stellar_mass,
        features.subclass,
        features.surface_gravity,
        features.surface_pressure,
        features.surface_temperature,
        features.terraform_state,
        features.volcanism,
    ])?;
    Ok(())
}

fn save_genus(conn: &Connection, body_row: i64, genus: &Genus) -> Result<(), StorageError> {
    conn.prepare_cached(
        "
        INSERT INTO genuses (body_id, genus, genus_localised)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(body_id, genus, genus_localised) DO NOTHING
        ",
    )?
    .execute(params![body_row, genus.genus, genus.genus_localised])?;
    let genus_row: i64 = conn
        .prepare_cached(
            "SELECT id FROM genuses WHERE body_id = ?1 AND genus = ?2 AND genus_localised = ?3",
        )?
        .query_row(params![body_row, genus.genus, genus.genus_localised], |row| {
            row.get(0)
        })?;

    for scan in &genus.scans {
        conn.prepare_cached(
            "
            INSERT INTO genus_scans (
                genus_id, species, species_localised, variant, variant_localised, count, done
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(genus_id, species_localised, variant_localised) DO UPDATE SET
                species=excluded.species,
                variant=excluded.variant,
                count=excluded.count,
                done=excluded.done
            ",
        )?
        .execute(params![
            genus_row,
            scan.species,
            scan.species_localised,
            scan.variant,
            scan.variant_localised,
            scan.count,
            scan.done,
        ])?;
    }
    Ok(())
}
