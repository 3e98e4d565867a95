//! Business ruleset for the consolidated sales table.
//!
//! Each step is one enrichment batch applied to the running frame, so a
//! later step sees every column the earlier ones produced. Reference
//! tables that need cleanup before joining (trimmed or stringified keys)
//! are preprocessed through the same engine and passed as source
//! overrides. The final frame is written back in a single replace.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use tracing::info;
use ventisca_core::{
    enrich, Aggregator, AuditSink, ColumnSpec, LookupDef, PivotSpec, TableStore, Value,
};

/// Sheets of the reference workbook, each imported as a table of the same
/// name.
pub const REFERENCE_SHEETS: [&str; 9] = [
    "CANAL",
    "CENTROS",
    "SEGMENTO_CLIENTE",
    "SEGMENTO_CODIGO",
    "TIPO_FACTURAS",
    "MARA",
    "CODIGOS_CAMBIAN",
    "CLIENTES",
    "WALMART_ESA_MASTER_PACK",
];

/// Article prefixes classified as DEFERRET before the generic paint
/// prefixes "1"/"2" are checked. Order matters.
const DEFERRET_PREFIXES: [&str; 3] = ["10074", "956", "951"];
const EMPAQUE_INITIALS: [char; 11] = ['E', 'L', 'C', 'A', 'B', 'F', 'H', 'I', 'N', 'T', 'J'];

/// Distribution channel rerouted to wholesale for the G601 centre.
const WHOLESALE_CHANNEL: &str = "20";
const WHOLESALE_CENTRE: &str = "G601";

/// Units divisor for Guatemalan retail paint, line 500-0.
const RETAIL_PAINT_DIVISOR: f64 = 2063.0;
/// Client billed in masterpack multiples rather than sale units.
const MASTERPACK_CLIENT: &str = "110004493";

const FILTRO1_CLASIFICACIONES: [&str; 4] =
    ["PINTURA", "PROYECTOS B2B", "APLICADORES", "DEFERRET"];
/// Hand-curated PAIS+CLIENTE_DESCRPCION+MATERIAL keys that pass FILTRO1
/// regardless of classification.
const FILTRO1_EXCEPCIONES: [&str; 3] = [
    "TEGUCIPALPAGRUPO DEWARE S.AE000000000-01",
    "TEGUCIPALPAGRUPO DEWARE S.AE000000025-05",
    "TEGUCIPALPAGRUPO DEWARE S.AE000000000-04",
];

/// Prefix-priority article classification.
pub fn classify_articulo(articulo: &str, canal_distribucion: &str, centros: &str) -> &'static str {
    if canal_distribucion == "30" && centros == "ZSER" {
        return "PROYECTOS B2B";
    }
    if DEFERRET_PREFIXES
        .iter()
        .any(|prefix| articulo.starts_with(prefix))
    {
        return "DEFERRET";
    }
    if articulo.starts_with('1') || articulo.starts_with('2') {
        return "PINTURA";
    }
    if articulo.starts_with('0') {
        return "APLICADORES";
    }
    if articulo.starts_with('D') {
        return "MP";
    }
    if articulo.starts_with('8') {
        return "MERCADEO";
    }
    if articulo.starts_with('9') {
        return "LIQUIDACIÓN";
    }
    if articulo
        .chars()
        .next()
        .is_some_and(|initial| EMPAQUE_INITIALS.contains(&initial))
    {
        return "EMPAQUE";
    }
    if articulo.starts_with('S') {
        return "SERVICIO";
    }
    if articulo.starts_with('O') || articulo.starts_with('R') {
        return "INSUMO";
    }
    "DEFERRET"
}

/// Run every enrichment step over `table` and persist the result once.
pub fn complete_sales_table<S, A>(store: &S, audit: &A, table: &str) -> Result<DataFrame>
where
    S: TableStore,
    A: AuditSink,
{
    let none = HashMap::new();

    info!(step = "PAIS");
    let frame = enrich(
        store,
        audit,
        table,
        None,
        &ColumnSpec::new().lookup(
            "PAIS",
            LookupDef::new("CENTROS", "CENTRO")
                .target("Centro")
                .column("PAIS_2"),
        ),
        &none,
        false,
    )?;

    info!(step = "CENTROS");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().lookup(
            "CENTROS",
            LookupDef::new("CENTROS", "CENTRO")
                .target("Centro")
                .column("CENTRO_ID"),
        ),
        &none,
        false,
    )?;

    info!(step = "CANAL");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().lookup(
            "CANAL",
            LookupDef::new("CANAL", "CANAL_ID")
                .target("Canal distribución")
                .column("CANAL_DESCRIP"),
        ),
        &none,
        false,
    )?;
    // Wholesale override is a second batch so it can see the CANAL lookup.
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("CANAL", |row| {
            if row.text("Canal distribución") == WHOLESALE_CHANNEL
                && row.text("CENTROS") == WHOLESALE_CENTRE
            {
                return Ok(Value::Str("WHOLESALE DEFERRET".to_string()));
            }
            Ok(row.get("CANAL").unwrap_or(Value::Null))
        }),
        &none,
        false,
    )?;

    info!(step = "CLIENTE_DESCRPCION");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().lookup(
            "CLIENTE_DESCRPCION",
            LookupDef::new("CLIENTES", "Deudor")
                .target("Cliente")
                .column("Nombre_1"),
        ),
        &none,
        false,
    )?;

    info!(step = "CLASIFICACION");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("CLASIFICACION", |row| {
            Ok(Value::Str(
                classify_articulo(
                    &row.text("Artículo"),
                    &row.text("Canal distribución"),
                    &row.text("CENTROS"),
                )
                .to_string(),
            ))
        }),
        &none,
        false,
    )?;

    info!(step = "FAMILIA");
    // Placeholder until commercial defines the family catalogue.
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("FAMILIA", |_row| Ok(Value::Str("---".to_string()))),
        &none,
        false,
    )?;

    info!(step = "LINEA");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("LINEA", |row| {
            Ok(Value::Str(row.text("Artículo").chars().take(5).collect()))
        }),
        &none,
        false,
    )?;

    info!(step = "MATERIAL");
    // CODIGO_SER arrives with stray whitespace; trim it before joining.
    let codigos = enrich(
        store,
        audit,
        "CODIGOS_CAMBIAN",
        None,
        &ColumnSpec::new().derived("CODIGO_SER", |row| {
            Ok(Value::Str(row.text("CODIGO_SER").trim().to_string()))
        }),
        &none,
        false,
    )?;
    let mut overrides = HashMap::new();
    overrides.insert("CODIGOS_CAMBIAN".to_string(), codigos);
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().lookup(
            "MATERIAL",
            LookupDef::new("CODIGOS_CAMBIAN", "CODIGO_SER")
                .target("Artículo")
                .column("CODIGO_PT"),
        ),
        &overrides,
        false,
    )?;
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("MATERIAL", |row| {
            if row.text("PAIS") == "GUATEMALA" && row.text("CANAL") == "RETAIL" {
                return Ok(Value::Str(row.text("Artículo")));
            }
            if row.is_null("MATERIAL") {
                return Ok(Value::Str(row.text("Artículo")));
            }
            Ok(row.get("MATERIAL").unwrap_or(Value::Null))
        }),
        &none,
        false,
    )?;

    info!(step = "SEGMENTO");
    // Keys on both sides must compare as text.
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new()
            .derived("Cliente", |row| Ok(Value::Str(row.text("Cliente"))))
            .derived("MATERIAL", |row| Ok(Value::Str(row.text("MATERIAL")))),
        &none,
        false,
    )?;
    let segmento_cliente = enrich(
        store,
        audit,
        "SEGMENTO_CLIENTE",
        None,
        &ColumnSpec::new().derived("ID_CLIENTE", |row| {
            Ok(Value::Str(row.text("ID_CLIENTE")))
        }),
        &none,
        false,
    )?;
    let segmento_codigo = enrich(
        store,
        audit,
        "SEGMENTO_CODIGO",
        None,
        &ColumnSpec::new().derived("MATERIAL", |row| Ok(Value::Str(row.text("MATERIAL")))),
        &none,
        false,
    )?;
    let mut overrides = HashMap::new();
    overrides.insert("SEGMENTO_CLIENTE".to_string(), segmento_cliente);
    overrides.insert("SEGMENTO_CODIGO".to_string(), segmento_codigo);
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new()
            .lookup(
                "SEG1",
                LookupDef::new("SEGMENTO_CLIENTE", "ID_CLIENTE")
                    .target("Cliente")
                    .column("SEGMENTO"),
            )
            .lookup(
                "SEG2",
                LookupDef::new("SEGMENTO_CODIGO", "MATERIAL")
                    .target("MATERIAL")
                    .column("SEGMENTO"),
            ),
        &overrides,
        false,
    )?;
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("SEGMENTO", |row| {
            if !row.is_null("SEG1") {
                return Ok(row.get("SEG1").unwrap_or(Value::Null));
            }
            if !row.is_null("SEG2") {
                return Ok(row.get("SEG2").unwrap_or(Value::Null));
            }
            Ok(Value::Str(row.text("CLASIFICACION")))
        }),
        &none,
        false,
    )?;
    let frame = frame.drop("SEG1")?.drop("SEG2")?;

    info!(step = "DESCRIPTION");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().lookup(
            "DESCRIPTION",
            LookupDef::new("MARA", "Material")
                .target("MATERIAL")
                .column("Texto_breve_de_material"),
        ),
        &none,
        false,
    )?;

    info!(step = "VALIDACION_COD");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("VALIDACION_COD", |row| {
            Ok(Value::Str(
                (row.text("Artículo") == row.text("MATERIAL")).to_string(),
            ))
        }),
        &none,
        false,
    )?;

    info!(step = "VOLUMEN");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().lookup(
            "VOLUMEN",
            LookupDef::new("MARA", "Material")
                .target("MATERIAL")
                .column("Volumen"),
        ),
        &none,
        false,
    )?;
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("VOLUMEN", |row| {
            if row.is_null("VOLUMEN") {
                return Ok(Value::Float(0.0));
            }
            Ok(row.get("VOLUMEN").unwrap_or(Value::Null))
        }),
        &none,
        false,
    )?;

    info!(step = "UNIDADES");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().lookup(
            "UNIDADES",
            LookupDef::new("WALMART_ESA_MASTER_PACK", "CODIGO_SAP")
                .target("MATERIAL")
                .column("MASTERPACK_COMERCIAL"),
        ),
        &none,
        false,
    )?;
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("UNIDADES", |row| {
            if row.text("MATERIAL") == "NA" {
                return Ok(Value::Float(0.0));
            }
            if row.text("PAIS") == "GUATEMALA"
                && row.text("CANAL") == "RETAIL"
                && row.text("LINEA") == "500-0"
            {
                return Ok(Value::Float(
                    row.number("Volumen de ventas") / RETAIL_PAINT_DIVISOR,
                ));
            }
            if row.text("Cliente") == MASTERPACK_CLIENT {
                return Ok(Value::Float(
                    row.number("UNIDADES") * row.number("Volumen de ventas"),
                ));
            }
            Ok(Value::Float(row.number("Volumen de ventas")))
        }),
        &none,
        false,
    )?;

    info!(step = "MONTO_USD");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("MONTO_USD", |row| {
            if row.text("MATERIAL") == "NA" {
                return Ok(Value::Float(0.0));
            }
            Ok(Value::Float(row.number("Valor Neto")))
        }),
        &none,
        false,
    )?;

    info!(step = "GALONES");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("GALONES", |row| {
            Ok(Value::Float(row.number("UNIDADES") * row.number("VOLUMEN")))
        }),
        &none,
        false,
    )?;

    info!(step = "FILTRO1");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("FILTRO1", |row| {
            if FILTRO1_CLASIFICACIONES.contains(&row.text("CLASIFICACION").as_str()) {
                return Ok(Value::Str("SI".to_string()));
            }
            let key = format!(
                "{}{}{}",
                row.text("PAIS"),
                row.text("CLIENTE_DESCRPCION"),
                row.text("MATERIAL")
            );
            Ok(Value::Str(
                if FILTRO1_EXCEPCIONES.contains(&key.as_str()) {
                    "SI"
                } else {
                    "NO"
                }
                .to_string(),
            ))
        }),
        &none,
        false,
    )?;

    info!(step = "FILTRO2");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().lookup(
            "FILTRO2",
            LookupDef::new("TIPO_FACTURAS", "TIPO_FACTURA")
                .target("Clase de factura")
                .column("VENTA_BRUTA"),
        ),
        &none,
        false,
    )?;

    info!(step = "FILTRO3");
    let frame = enrich(
        store,
        audit,
        table,
        Some(frame),
        &ColumnSpec::new().derived("FILTRO3", |row| {
            Ok(Value::Str(
                if format!("{}{}", row.text("FILTRO1"), row.text("FILTRO2")) == "SISI" {
                    "SI"
                } else {
                    "NO"
                }
                .to_string(),
            ))
        }),
        &none,
        false,
    )?;

    store
        .put(table, &frame)
        .with_context(|| format!("failed to persist enriched table '{table}'"))?;
    info!(table, rows = frame.height(), "sales table completed");
    Ok(frame)
}

/// Pivot spec of the classification reports: classification dimensions as
/// rows, the period as columns, summed quantities as values. The gross
/// variant only counts rows that passed every filter.
pub fn report_pivot_spec(gross_only: bool) -> PivotSpec {
    let mut filters = BTreeMap::new();
    if gross_only {
        filters.insert(
            "FILTRO3".to_string(),
            vec![Value::Str("SI".to_string())],
        );
    }
    PivotSpec {
        rows: [
            "PAIS",
            "CANAL",
            "CLASIFICACION",
            "SEGMENTO",
            "FAMILIA",
            "LINEA",
            "CENTROS",
            "MATERIAL",
            "DESCRIPTION",
        ]
        .iter()
        .map(|name| name.to_string())
        .collect(),
        columns: vec!["Período/Año".to_string()],
        values: ["UNIDADES", "MONTO_USD", "GALONES"]
            .iter()
            .map(|name| name.to_string())
            .collect(),
        filters,
        aggregator: Aggregator::Sum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;
    use ventisca_core::{NullAudit, SqliteStore};

    fn column_text(frame: &DataFrame, name: &str) -> Vec<String> {
        frame
            .column(name)
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .map(|value| value.to_string())
            .collect()
    }

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();

        store
            .put(
                "VentaHistoricaTOTAL",
                &df!(
                    "Centro" => &["G601", "ZSER"],
                    "Canal distribución" => &["20", "30"],
                    "Cliente" => &["C1", "110004493"],
                    "Artículo" => &["2001", "XYZ"],
                    "Clase de factura" => &["F1", "F2"],
                    "Volumen de ventas" => &[10.0f64, 2.0],
                    "Valor Neto" => &[100.0f64, 50.0],
                    "Período/Año" => &["001.2024", "001.2024"],
                )
                .unwrap(),
            )
            .unwrap();

        store
            .put(
                "CENTROS",
                &df!(
                    "CENTRO" => &["G601", "ZSER"],
                    "PAIS_2" => &["GUATEMALA", "EL SALVADOR"],
                    "CENTRO_ID" => &["G601", "ZSER"],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .put(
                "CANAL",
                &df!(
                    "CANAL_ID" => &["20", "30"],
                    "CANAL_DESCRIP" => &["WHOLESALE", "PROYECTOS"],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .put(
                "CLIENTES",
                &df!(
                    "Deudor" => &["C1"],
                    "Nombre_1" => &["CLIENTE UNO"],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .put(
                "CODIGOS_CAMBIAN",
                &df!(
                    "CODIGO_SER" => &[" 2001 "],
                    "CODIGO_PT" => &["2001-PT"],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .put(
                "SEGMENTO_CLIENTE",
                &df!(
                    "ID_CLIENTE" => &["C1"],
                    "SEGMENTO" => &["HOGAR"],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .put(
                "SEGMENTO_CODIGO",
                &df!(
                    "MATERIAL" => &["ZZZ"],
                    "SEGMENTO" => &["OTRO"],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .put(
                "MARA",
                &df!(
                    "Material" => &["2001-PT"],
                    "Texto_breve_de_material" => &["PINTURA BLANCA"],
                    "Volumen" => &[1.5f64],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .put(
                "WALMART_ESA_MASTER_PACK",
                &df!(
                    "CODIGO_SAP" => &["2001-PT"],
                    "MASTERPACK_COMERCIAL" => &[6.0f64],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .put(
                "TIPO_FACTURAS",
                &df!(
                    "TIPO_FACTURA" => &["F1", "F2"],
                    "VENTA_BRUTA" => &["SI", "NO"],
                )
                .unwrap(),
            )
            .unwrap();

        store
    }

    #[test]
    fn complete_sales_table_runs_every_step() {
        let store = seeded_store();
        let frame = complete_sales_table(&store, &NullAudit, "VentaHistoricaTOTAL").unwrap();

        assert_eq!(frame.height(), 2);
        assert_eq!(column_text(&frame, "PAIS"), vec!["GUATEMALA", "EL SALVADOR"]);
        // Channel 20 at centre G601 is rerouted to wholesale.
        assert_eq!(
            column_text(&frame, "CANAL"),
            vec!["WHOLESALE DEFERRET", "PROYECTOS"]
        );
        assert_eq!(
            column_text(&frame, "CLASIFICACION"),
            vec!["PINTURA", "PROYECTOS B2B"]
        );
        // Trimmed CODIGO_SER matched row 1; row 2 falls back to the article.
        assert_eq!(column_text(&frame, "MATERIAL"), vec!["2001-PT", "XYZ"]);
        // SEG1 match, then classification fallback.
        assert_eq!(
            column_text(&frame, "SEGMENTO"),
            vec!["HOGAR", "PROYECTOS B2B"]
        );
        assert_eq!(column_text(&frame, "FILTRO3"), vec!["SI", "NO"]);

        let galones: Vec<f64> = frame
            .column("GALONES")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(galones, vec![15.0, 0.0]);

        // Persisted in one write under the same name.
        let stored = store.get("VentaHistoricaTOTAL").unwrap();
        assert_eq!(stored.height(), 2);
        assert!(stored
            .get_column_names()
            .iter()
            .any(|name| name.as_str() == "FILTRO3"));
    }

    #[test]
    fn deferret_prefixes_beat_generic_paint_prefixes() {
        // "10074A" starts with "1" but the DEFERRET prefix wins.
        assert_eq!(classify_articulo("10074A", "X", "X"), "DEFERRET");
        assert_eq!(classify_articulo("2001", "Y", "Y"), "PINTURA");
        assert_eq!(classify_articulo("99", "Z", "Z"), "LIQUIDACIÓN");
    }

    #[test]
    fn b2b_channel_overrides_article_prefix() {
        assert_eq!(classify_articulo("2001", "30", "ZSER"), "PROYECTOS B2B");
        assert_eq!(classify_articulo("2001", "30", "G601"), "PINTURA");
    }

    #[test]
    fn remaining_prefix_buckets() {
        assert_eq!(classify_articulo("956X", "", ""), "DEFERRET");
        assert_eq!(classify_articulo("0400", "", ""), "APLICADORES");
        assert_eq!(classify_articulo("D10", "", ""), "MP");
        assert_eq!(classify_articulo("800", "", ""), "MERCADEO");
        assert_eq!(classify_articulo("E-CAJA", "", ""), "EMPAQUE");
        assert_eq!(classify_articulo("S01", "", ""), "SERVICIO");
        assert_eq!(classify_articulo("R77", "", ""), "INSUMO");
        assert_eq!(classify_articulo("XYZ", "", ""), "DEFERRET");
        assert_eq!(classify_articulo("", "", ""), "DEFERRET");
    }

    #[test]
    fn gross_report_filters_on_filtro3() {
        let gross = report_pivot_spec(true);
        assert_eq!(
            gross.filters.get("FILTRO3"),
            Some(&vec![Value::Str("SI".to_string())])
        );
        let net = report_pivot_spec(false);
        assert!(net.filters.is_empty());
        assert_eq!(net.columns, vec!["Período/Año".to_string()]);
        assert_eq!(net.rows.len(), 9);
    }
}
