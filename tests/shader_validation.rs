use fluid_cursor::ProgramKind;

fn validate(kind: ProgramKind, errors: &mut Vec<String>) -> Option<naga::Module> {
    let source = kind.source();
    let module = match naga::front::wgsl::parse_str(&source) {
        Ok(module) => module,
        Err(e) => {
            errors.push(format!("Failed to parse {}:\n{}", kind.label(), e.emit_to_string(&source)));
            return None;
        }
    };

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );

    if let Err(e) = validator.validate(&module) {
        errors.push(format!("Failed to validate {}:\n{:?}", kind.label(), e));
        return None;
    }
    Some(module)
}

#[test]
fn validate_all_programs() {
    let mut errors = Vec::new();
    for kind in ProgramKind::ALL {
        validate(kind, &mut errors);
    }

    if !errors.is_empty() {
        panic!("Shader validation failed:\n{}", errors.join("\n"));
    }
}

#[test]
fn every_program_has_both_entry_points() {
    let mut errors = Vec::new();
    for kind in ProgramKind::ALL {
        let Some(module) = validate(kind, &mut errors) else {
            continue;
        };
        let stages: Vec<_> = module.entry_points.iter().map(|e| (e.name.as_str(), e.stage)).collect();
        assert!(stages.contains(&("vs_main", naga::ShaderStage::Vertex)), "{}", kind.label());
        assert!(stages.contains(&("fs_main", naga::ShaderStage::Fragment)), "{}", kind.label());
    }
    assert!(errors.is_empty(), "{}", errors.join("\n"));
}

#[test]
fn specialised_programs_declare_their_overrides() {
    let overrides = |kind| {
        validate(kind, &mut Vec::new())
            .map(|m| m.overrides.iter().filter_map(|(_, o)| o.name.clone()).collect::<Vec<_>>())
            .unwrap_or_default()
    };

    assert_eq!(overrides(ProgramKind::Display), vec!["SHADING".to_string()]);
    assert_eq!(overrides(ProgramKind::Advection), vec!["MANUAL_FILTERING".to_string()]);
    assert!(overrides(ProgramKind::Copy).is_empty());
}
