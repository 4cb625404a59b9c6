//! Integration tests for project editing, undo/redo and persistence

use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use pipeworks::actions::{
    ActionStack, DuplicatePolicy, ExcludeAction, IncludeAction, ItemChange, MoveAction,
    ProjectProperty, UpdateContentItemAction, UpdateProcessorParamAction,
    UpdateProjectPropertyAction, Workspace,
};
use pipeworks::persist::{parse_script, write_script};
use pipeworks::pipeline::params::ParamValue;
use pipeworks::pipeline::registry::PipelineRegistry;
use pipeworks::pipeline::resolve::resolve_all;
use pipeworks::project::model::{BuildAction, Project, TargetPlatform};
use pipeworks::view::NullView;

fn touch(dir: &Path, rel: &str) -> PathBuf {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"content").unwrap();
    path
}

fn workspace(dir: &Path) -> Workspace {
    Workspace::new(
        Project::with_origin(dir.join("Content.mgcb")),
        PipelineRegistry::with_defaults(),
        Box::new(NullView),
    )
}

fn seeded(dir: &Path) -> (Workspace, ActionStack<Workspace>) {
    let mut ws = workspace(dir);
    let mut stack: ActionStack<Workspace> = ActionStack::default();
    let files = vec![
        touch(dir, "Textures/hero.png"),
        touch(dir, "Textures/tiles.png"),
        touch(dir, "Fonts/title.spritefont"),
        touch(dir, "Data/levels.txt"),
    ];
    let include = IncludeAction::new(&ws.project, &files, &[], DuplicatePolicy::Skip);
    stack.execute(Box::new(include), &mut ws).unwrap();
    (ws, stack)
}

#[test]
fn test_undo_everything_restores_snapshot() {
    let dir = TempDir::new().unwrap();
    let (mut ws, _) = seeded(dir.path());
    let mut stack: ActionStack<Workspace> = ActionStack::default();
    let before = ws.project.snapshot();

    stack
        .execute(
            Box::new(UpdateProcessorParamAction::new(
                vec!["Textures/hero.png".to_string()],
                "ColorKeyEnabled",
                "False",
            )),
            &mut ws,
        )
        .unwrap();
    stack
        .execute(
            Box::new(UpdateContentItemAction::new(
                vec!["Data/levels.txt".to_string()],
                ItemChange::BuildAction(BuildAction::Copy),
            )),
            &mut ws,
        )
        .unwrap();
    stack
        .execute(
            Box::new(UpdateProjectPropertyAction::new(ProjectProperty::Platform(
                TargetPlatform::Windows,
            ))),
            &mut ws,
        )
        .unwrap();
    stack
        .execute(Box::new(MoveAction::folder("Textures", "Art/Textures")), &mut ws)
        .unwrap();
    stack
        .execute(
            Box::new(ExcludeAction::new(
                vec!["Fonts/title.spritefont".to_string()],
                vec![],
                false,
            )),
            &mut ws,
        )
        .unwrap();
    assert_ne!(ws.project.snapshot(), before);

    for _ in 0..5 {
        assert!(stack.undo(&mut ws).unwrap().is_some());
    }
    assert_eq!(stack.undo(&mut ws).unwrap(), None);
    assert_eq!(ws.project.snapshot(), before);
    assert!(dir.path().join("Textures/hero.png").exists());
}

#[test]
fn test_redo_and_new_action_clears_redo() {
    let dir = TempDir::new().unwrap();
    let (mut ws, mut stack) = seeded(dir.path());

    stack
        .execute(
            Box::new(UpdateProcessorParamAction::new(
                vec!["Textures/hero.png".to_string()],
                "GenerateMipmaps",
                "True",
            )),
            &mut ws,
        )
        .unwrap();
    let after = ws.project.snapshot();

    stack.undo(&mut ws).unwrap();
    assert_ne!(ws.project.snapshot(), after);
    stack.redo(&mut ws).unwrap();
    assert_eq!(ws.project.snapshot(), after);

    stack.undo(&mut ws).unwrap();
    assert!(stack.can_redo());
    stack
        .execute(
            Box::new(UpdateProjectPropertyAction::new(ProjectProperty::Config(
                "Release".to_string(),
            ))),
            &mut ws,
        )
        .unwrap();
    assert!(!stack.can_redo());
}

#[test]
fn test_duplicate_include_skip_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (mut ws, mut stack) = seeded(dir.path());
    let before = ws.project.snapshot();

    let again = IncludeAction::new(
        &ws.project,
        &[dir.path().join("Textures/hero.png")],
        &[],
        DuplicatePolicy::Skip,
    )
    .with_types("TextureImporter", "ModelProcessor");
    let err = stack.execute(Box::new(again), &mut ws).unwrap_err();

    assert_eq!(err.error_code(), "DUPLICATE_ITEM");
    assert_eq!(ws.project.snapshot(), before);
    assert_eq!(stack.undo_count(), 1);
}

#[test]
fn test_duplicate_include_replace_keeps_one_item() {
    let dir = TempDir::new().unwrap();
    let (mut ws, mut stack) = seeded(dir.path());
    let position = ws.project.index_of("Fonts/title.spritefont").unwrap();

    let again = IncludeAction::new(
        &ws.project,
        &[dir.path().join("Fonts/title.spritefont")],
        &[],
        DuplicatePolicy::Replace,
    )
    .with_types("FontDescriptionImporter", "FontTextureProcessor");
    stack.execute(Box::new(again), &mut ws).unwrap();

    let matching: Vec<_> = ws
        .project
        .items
        .iter()
        .filter(|i| i.source_file == "Fonts/title.spritefont")
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].processor_name, "FontTextureProcessor");
    assert_eq!(ws.project.index_of("Fonts/title.spritefont"), Some(position));

    stack.undo(&mut ws).unwrap();
    let font = ws.project.item("Fonts/title.spritefont").unwrap();
    assert_eq!(font.processor_name, "FontDescriptionProcessor");
}

#[test]
fn test_folder_move_rewrites_prefixed_items() {
    let dir = TempDir::new().unwrap();
    let (mut ws, mut stack) = seeded(dir.path());

    stack
        .execute(Box::new(MoveAction::folder("Textures", "Art/Textures")), &mut ws)
        .unwrap();
    let paths: Vec<&str> = ws.project.items.iter().map(|i| i.source_file.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "Art/Textures/hero.png",
            "Art/Textures/tiles.png",
            "Fonts/title.spritefont",
            "Data/levels.txt",
        ]
    );
    assert!(dir.path().join("Art/Textures/tiles.png").exists());
    assert!(!dir.path().join("Textures").exists());

    stack.undo(&mut ws).unwrap();
    assert!(ws.project.contains_item("Textures/hero.png"));
    assert!(ws.project.contains_item("Textures/tiles.png"));
    assert!(dir.path().join("Textures/hero.png").exists());
}

#[test]
fn test_move_onto_existing_file_is_refused() {
    let dir = TempDir::new().unwrap();
    let (mut ws, mut stack) = seeded(dir.path());
    touch(dir.path(), "Textures/taken.png");
    let before = ws.project.snapshot();

    let err = stack
        .execute(Box::new(MoveAction::item("Textures/hero.png", "Textures/taken.png")), &mut ws)
        .unwrap_err();

    assert_eq!(err.error_code(), "DESTINATION_EXISTS");
    assert_eq!(ws.project.snapshot(), before);
    assert!(dir.path().join("Textures/hero.png").exists());
}

#[test]
fn test_save_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let script = "\
/outputDir:bin/$(Platform)
/intermediateDir:obj/$(Platform)
/platform:Android
/config:Release
/profile:HiDef
/compress:True
/reference:../Libs/Tiled.Pipeline.dll

#begin Textures/hero.png
/importer:TextureImporter
/processor:TextureProcessor
/processorParam:ColorKeyEnabled=False
/processorParam:TextureFormat=Compressed
/build:Textures/hero.png

#begin Maps/level1.tmx
/importer:TiledMapImporter
/processor:TiledMapProcessor
/processorParam:Scale=2
/processorParam:Layers=\"ground;walls\"
/build:Maps/level1.tmx

#begin Data/levels.txt
/copy:Data/levels.txt
";
    let path = dir.path().join("Content.mgcb");
    fs::write(&path, script).unwrap();

    let mut project = Project::load(&path).unwrap();
    let registry = PipelineRegistry::with_defaults();
    resolve_all(&mut project, &registry);

    let level = project.item("Maps/level1.tmx").unwrap();
    assert!(level.processor.is_missing());
    assert_eq!(
        level.processor_params.get("Layers"),
        Some(&ParamValue::Raw("ground;walls".to_string()))
    );

    let copy = dir.path().join("Copy.mgcb");
    project.save_as(&copy).unwrap();

    let mut reloaded = Project::load(&copy).unwrap();
    resolve_all(&mut reloaded, &registry);
    assert_eq!(reloaded.snapshot(), project.snapshot());
    assert_eq!(write_script(&reloaded), write_script(&project));
    assert!(reloaded.compress);
    assert_eq!(reloaded.references, vec!["../Libs/Tiled.Pipeline.dll".to_string()]);
}

#[test]
fn test_malformed_script_reports_line() {
    let err = parse_script("/platform:Windows\n\n/build\n").unwrap_err();
    assert_eq!(err.error_code(), "MALFORMED_LINE");
    assert!(err.to_string().contains("line 3"));
}
