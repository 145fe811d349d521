//! Purpose: Hold top-level CLI command dispatch for `facetmap`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Output envelopes and exit code semantics stay stable.
//! Invariants: Helpers in `main.rs` remain the source of shared parsing logic.

use super::*;

pub(super) fn dispatch_command(command: Command, registry_dir: PathBuf) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "facetmap", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_json(json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Init {
            name,
            admin,
            introspect,
            probe,
        } => {
            std::fs::create_dir_all(&registry_dir).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_path(&registry_dir)
                    .with_source(err)
            })?;
            let path = resolve_image_path(&name, &registry_dir)?;
            let set = BootstrapSet {
                admin: parse_facet_addr(&admin)?,
                introspect: parse_facet_addr(&introspect)?,
                probe: parse_facet_addr(&probe)?,
            };
            let registry = Registry::bootstrap(set)?;
            Image::create(&path, &registry)?;
            tracing::debug!(registry = %name, path = %path.display(), "created registry image");
            emit_json(json!({
                "created": {
                    "registry": name,
                    "path": path.display().to_string(),
                    "facets": registry.facet_count(),
                    "selectors": registry.selector_count(),
                }
            }));
            Ok(RunOutcome::ok())
        }
        Command::Apply { name, records } => {
            let path = resolve_image_path(&name, &registry_dir)?;
            let image = Image::open(&path)?;
            let _lock = image.lock()?;
            let mut registry = image.load()?;

            let raw = records
                .iter()
                .map(|record| hex_to_bytes(record))
                .collect::<Result<Vec<_>, _>>()?;
            let batch = decode_batch(&raw)?;
            tracing::debug!(registry = %name, records = batch.len(), "applying update batch");
            registry.apply(&batch)?;
            image.store(&registry)?;

            emit_json(json!({
                "registry": name,
                "applied": batch.len(),
                "facets": registry.facet_count(),
                "selectors": registry.selector_count(),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Facets { name } => {
            let registry = load_registry(&name, &registry_dir)?;
            let facets = registry
                .facets()
                .iter()
                .map(|facet| facet.to_string())
                .collect::<Vec<_>>();
            emit_json(json!({
                "registry": name,
                "facets": facets,
                "packed": format!("0x{}", bytes_to_hex(&packed_facets(&registry))),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Selectors { name, facet } => {
            let registry = load_registry(&name, &registry_dir)?;
            let facet = parse_facet_addr(&facet)?;
            let selectors = registry
                .selectors_of(facet)
                .iter()
                .map(|selector| selector.to_string())
                .collect::<Vec<_>>();
            emit_json(json!({
                "registry": name,
                "facet": facet.to_string(),
                "selectors": selectors,
                "packed": format!("0x{}", bytes_to_hex(&packed_selectors(&registry, facet))),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Owner { name, selector } => {
            let registry = load_registry(&name, &registry_dir)?;
            let selector = parse_selector(&selector)?;
            let owner = packed_owner(&registry, selector);
            emit_json(json!({
                "registry": name,
                "selector": selector.to_string(),
                "owner": format!("0x{}", bytes_to_hex(&owner)),
                "owned": registry.owner_of(selector).is_some(),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Entries { name } => {
            let registry = load_registry(&name, &registry_dir)?;
            let entries = registry
                .entries()
                .into_iter()
                .zip(packed_entries(&registry))
                .map(|((facet, selectors), packed)| {
                    json!({
                        "facet": facet.to_string(),
                        "selectors": selectors
                            .iter()
                            .map(|selector| selector.to_string())
                            .collect::<Vec<_>>(),
                        "packed": format!("0x{}", bytes_to_hex(&packed)),
                    })
                })
                .collect::<Vec<_>>();
            emit_json(json!({ "registry": name, "entries": entries }));
            Ok(RunOutcome::ok())
        }
        Command::Audit { name } => {
            let registry = load_registry(&name, &registry_dir)?;
            let report = report(&registry);
            let value = serde_json::to_value(&report).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("report encode failed")
                    .with_source(err)
            })?;
            emit_json(json!({ "registry": name, "report": value }));
            Ok(RunOutcome::ok())
        }
    }
}
