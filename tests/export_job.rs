//! End-to-end exports of in-memory scenes.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use glam::{DMat4, DVec3};
use tempfile::tempdir;

use usd_export::chaser::MetadataChaser;
use usd_export::job::{Compatibility, RenderLayerMode, UpAxisOption, MODELING_VARIANT_SET};
use usd_export::scene::Axis;
use usd_export::sdf::{open_package, package_entries};
use usd_export::{
    ChaserArgs, ChaserContext, ChaserRegistry, Error, ExportCallbacks, ExportChaser, JobExportArgs,
    Layer, MemoryScene, NodePath, Result, SceneGraph, SdfPath, Stage, TimeCode, Value, WriteJob,
};

fn p(s: &str) -> SdfPath {
    SdfPath::new(s).unwrap()
}

fn n(s: &str) -> NodePath {
    NodePath::new(s)
}

/// `|asset` with a cube and a sphere, each a transform over a mesh.
fn asset_scene() -> MemoryScene {
    let mut scene = MemoryScene::new();
    let cube = scene.add_node("|asset|cube|cubeShape", "mesh");
    let sphere = scene.add_node("|asset|sphere|sphereShape", "mesh");
    scene
        .set_attribute(&cube, "size", Value::Double(2.0))
        .set_attribute(&sphere, "radius", Value::Double(1.0))
        .set_transform(&n("|asset|sphere"), DMat4::from_translation(DVec3::new(3.0, 0.0, 0.0)));
    scene
}

fn open_stage(path: &Path) -> Stage {
    Stage::new(Layer::open(path).expect("Failed to open layer"))
}

#[test]
fn test_basic_export() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("asset.usda");
    let scene = asset_scene();

    let mut job = WriteJob::new(JobExportArgs::default(), &scene);
    job.write(&out, false).expect("export failed");

    assert_eq!(job.map_node_to_usd_path(&n("|asset|cube")), Some(&p("/asset/cube")));
    assert_eq!(job.map_node_to_usd_path(&n("|asset|cube|cubeShape")), Some(&p("/asset/cube")));
    assert_eq!(job.map_node_to_usd_path(&n("|nowhere")), None);

    let stage = open_stage(&out);
    assert_eq!(stage.default_prim(), Some("asset"));
    assert_eq!(stage.prim(&p("/asset/cube")).unwrap().type_name, "Mesh");
    assert_eq!(
        stage.attribute_value(&p("/asset/cube"), "size", TimeCode::Default),
        Some(Value::Double(2.0))
    );
    assert_eq!(stage.kind(&p("/asset")).as_deref(), Some("component"));
}

#[test]
fn test_overlapping_roots_fail_before_output() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("overlap.usda");
    let scene = asset_scene();

    let args = JobExportArgs::default().with_dag_paths(["|asset|cube", "|asset"]);
    let mut job = WriteJob::new(args, &scene);
    let err = job.write(&out, false).unwrap_err();
    assert!(matches!(err, Error::OverlappingRoots { .. }));
    assert!(!out.exists());
    assert!(job.dag_to_usd_path_map().is_empty());
}

#[test]
fn test_name_clash_after_stripping_namespaces() {
    let dir = tempdir().unwrap();
    let mut scene = MemoryScene::new();
    scene.add_node("|left:asset|ball", "transform");
    scene.add_node("|right:asset|ball", "transform");

    let args = JobExportArgs::default().with_strip_namespaces(true);
    let mut job = WriteJob::new(args, &scene);
    let err = job.write(dir.path().join("clash.usda"), false).unwrap_err();
    match err {
        Error::NameClash { path, first, second } => {
            assert_eq!(path, "/asset");
            assert_eq!(first, "|left:asset");
            assert_eq!(second, "|right:asset");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_merged_shape_is_not_a_clash() {
    let dir = tempdir().unwrap();
    let mut scene = MemoryScene::new();
    scene.add_node("|ns:asset|cube|ns:cubeShape", "mesh");

    let args = JobExportArgs::default().with_strip_namespaces(true);
    let mut job = WriteJob::new(args, &scene);
    job.write(dir.path().join("merged.usda"), false).expect("export failed");
    assert_eq!(
        job.map_node_to_usd_path(&n("|ns:asset|cube|ns:cubeShape")),
        Some(&p("/asset/cube"))
    );
}

#[test]
fn test_prune_empty_chain() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("pruned.usda");
    let mut scene = MemoryScene::new();
    scene.add_node("|root|a|b|c", "transform");
    scene.add_node("|root|geo|geoShape", "mesh");

    let args = JobExportArgs::default().with_include_empty_transforms(false);
    let mut job = WriteJob::new(args, &scene);
    job.write(&out, false).expect("export failed");

    let stage = open_stage(&out);
    assert!(stage.has_prim(&p("/root")));
    assert!(stage.has_prim(&p("/root/geo")));
    for gone in ["/root/a", "/root/a/b", "/root/a/b/c"] {
        assert!(!stage.has_prim(&p(gone)), "{} should be pruned", gone);
    }
}

#[test]
fn test_default_prim_survives_pruning() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("chain.usda");
    let mut scene = MemoryScene::new();
    scene.add_node("|chain|a|b", "transform");

    let args = JobExportArgs::default().with_include_empty_transforms(false);
    WriteJob::new(args, &scene).write(&out, false).expect("export failed");

    let stage = open_stage(&out);
    assert_eq!(stage.default_prim(), Some("chain"));
    assert!(stage.has_prim(&p("/chain")));
    assert!(!stage.has_prim(&p("/chain/a")));
}

#[test]
fn test_fallback_default_prim_survives_pruning() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("chain.usda");
    let mut scene = MemoryScene::new();
    scene.add_node("|chain|a|b", "transform");

    let mut args = JobExportArgs::default().with_include_empty_transforms(false);
    args.legacy_material_scope = true;
    WriteJob::new(args, &scene).write(&out, false).expect("export failed");

    let stage = open_stage(&out);
    assert_eq!(stage.default_prim(), Some("chain"));
    assert!(stage.has_prim(&p("/chain")));
    assert!(!stage.has_prim(&p("/chain/a")));
}

#[test]
fn test_verbose_logs_each_frame() {
    let dir = tempdir().unwrap();
    let scene = asset_scene();
    for (verbose, name) in [(true, "loud.usda"), (false, "quiet.usda")] {
        let buf = Arc::new(Mutex::new(Vec::<u8>::new()));
        let sink = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_target(false)
            .without_time()
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || SharedBuf(sink.clone()))
            .finish();
        let mut args = JobExportArgs::default().with_time_samples(vec![1.0, 2.5]);
        args.verbose = verbose;
        tracing::subscriber::with_default(subscriber, || {
            WriteJob::new(args, &scene)
                .write(dir.path().join(name), false)
                .expect("export failed");
        });
        let text = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        let frames: Vec<&str> = text
            .lines()
            .filter_map(|l| {
                let words: Vec<&str> = l.split_whitespace().collect();
                match words.as_slice() {
                    [.., prev, last] if *prev == "INFO" || prev.ends_with(':') => Some(*last),
                    _ => None,
                }
            })
            .filter(|w| *w == "1" || *w == "2.5")
            .collect();
        if verbose {
            assert_eq!(frames, vec!["1", "2.5"]);
        } else {
            assert!(frames.is_empty());
        }
    }
}

struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedBuf {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_reexport_is_byte_identical() {
    let dir = tempdir().unwrap();
    let mut scene = asset_scene();
    scene
        .set_transform_sample(&n("|asset|cube"), 1.0, DMat4::IDENTITY)
        .set_transform_sample(&n("|asset|cube"), 3.0, DMat4::from_translation(DVec3::Z));

    for name in ["same.usda", "same.usd"] {
        let out = dir.path().join(name);
        let mut runs = Vec::new();
        for _ in 0..2 {
            let args = JobExportArgs::default().with_time_samples(vec![1.0, 2.0, 3.0]);
            WriteJob::new(args, &scene).write(&out, false).expect("export failed");
            runs.push(std::fs::read(&out).unwrap());
        }
        assert_eq!(runs[0], runs[1], "{} differs between runs", name);
    }
}

#[test]
fn test_time_metadata_and_samples() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("anim.usda");
    let mut scene = asset_scene();
    scene
        .set_frames_per_second(30.0)
        .set_transform_sample(&n("|asset|cube"), 1.0, DMat4::IDENTITY)
        .set_transform_sample(&n("|asset|cube"), 2.0, DMat4::from_translation(DVec3::X));
    scene.set_current_time(7.0);

    let args = JobExportArgs::default().with_time_samples(JobExportArgs::frame_range(1.0, 2.0, 1.0));
    let mut job = WriteJob::new(args, &scene);
    job.write(&out, false).expect("export failed");
    assert_eq!(job.frames_written(), &[1.0, 2.0]);
    assert_eq!(scene.current_time(), 7.0);

    let layer = Layer::open(&out).unwrap();
    assert_eq!(layer.metadata.start_time_code, Some(1.0));
    assert_eq!(layer.metadata.end_time_code, Some(2.0));
    assert_eq!(layer.metadata.time_codes_per_second, Some(30.0));

    let stage = Stage::new(layer);
    let attr = stage.attribute(&p("/asset/cube"), "xformOp:transform").unwrap();
    assert_eq!(attr.time_samples.len(), 2);
}

fn variant_scene(order: &[&str]) -> MemoryScene {
    let mut scene = asset_scene();
    for layer in order {
        let members = match *layer {
            "A" => vec![n("|asset|cube")],
            "B" => vec![n("|asset|sphere")],
            _ => vec![n("|asset|cube"), n("|asset|sphere")],
        };
        scene.add_render_layer(layer, members);
    }
    scene.set_default_render_layer("B");
    scene
}

#[test]
fn test_default_variant_is_order_independent() {
    let dir = tempdir().unwrap();
    for (i, order) in [["A", "B", "C"], ["C", "B", "A"]].iter().enumerate() {
        let out = dir.path().join(format!("variants{}.usda", i));
        let scene = variant_scene(order);
        scene.set_current_render_layer("C");

        let args = JobExportArgs::default().with_render_layer_mode(RenderLayerMode::ModelingVariant);
        let mut job = WriteJob::new(args, &scene);
        job.write(&out, false).expect("export failed");
        assert_eq!(scene.current_render_layer(), "C");
        assert_eq!(job.map_node_to_usd_path(&n("|asset")), Some(&p("/_BaseModel_")));

        let stage = open_stage(&out);
        let root = p("/asset");
        assert_eq!(stage.default_prim(), Some("asset"));
        assert_eq!(stage.variant_selection(&root, MODELING_VARIANT_SET).as_deref(), Some("B"));
        assert_eq!(stage.variant_names(&root, MODELING_VARIANT_SET).len(), 3);
        assert!(!stage.prim(&p("/_BaseModel_")).unwrap().active);
        assert!(stage.prim(&p("/asset/sphere")).unwrap().active);
        assert!(!stage.prim(&p("/asset/cube")).unwrap().active);
    }
}

#[test]
fn test_modeling_variant_rejects_export_roots() {
    let dir = tempdir().unwrap();
    let scene = variant_scene(&["A", "B"]);
    let args = JobExportArgs::default()
        .with_render_layer_mode(RenderLayerMode::ModelingVariant)
        .with_export_roots(["|asset"]);
    let err = WriteJob::new(args, &scene)
        .write(dir.path().join("bad.usda"), false)
        .unwrap_err();
    assert!(matches!(err, Error::ExportRootsWithModelingVariant));
}

/// Shared log of chaser and callback activity.
#[derive(Default)]
struct Log {
    chaser_frames: Vec<f64>,
    callback_frames: Vec<f64>,
    finished: bool,
}

struct LoggingChaser {
    log: Rc<RefCell<Log>>,
    fail_at: Option<f64>,
}

impl ExportChaser for LoggingChaser {
    fn export_frame(&mut self, time: f64, _ctx: &mut ChaserContext<'_>) -> Result<()> {
        if self.fail_at == Some(time) {
            return Err(Error::other("boom"));
        }
        self.log.borrow_mut().chaser_frames.push(time);
        Ok(())
    }

    fn post_export(&mut self, _ctx: &mut ChaserContext<'_>) -> Result<()> {
        self.log.borrow_mut().finished = true;
        Ok(())
    }
}

struct StopAfter {
    log: Rc<RefCell<Log>>,
    frames: usize,
}

impl ExportCallbacks for StopAfter {
    fn per_frame(&mut self, time: f64) {
        self.log.borrow_mut().callback_frames.push(time);
    }

    fn is_interrupt_requested(&self) -> bool {
        self.log.borrow().callback_frames.len() >= self.frames
    }
}

fn logging_registry(log: &Rc<RefCell<Log>>, fail_at: Option<f64>) -> ChaserRegistry {
    let mut registry = ChaserRegistry::new();
    let log = Rc::clone(log);
    registry.register("logging", move |_args: &ChaserArgs, _ctx: &ChaserContext<'_>| {
        Ok(Box::new(LoggingChaser {
            log: Rc::clone(&log),
            fail_at,
        }) as Box<dyn ExportChaser>)
    });
    registry
}

#[test]
fn test_cancellation_after_third_frame() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("cancel.usda");
    let scene = asset_scene();
    let log = Rc::new(RefCell::new(Log::default()));

    let args = JobExportArgs::default()
        .with_time_samples(JobExportArgs::frame_range(1.0, 10.0, 1.0))
        .with_chasers(["logging"]);
    let mut job = WriteJob::new(args, &scene)
        .with_chaser_registry(logging_registry(&log, None))
        .with_callbacks(StopAfter {
            log: Rc::clone(&log),
            frames: 3,
        });
    job.write(&out, false).expect("export failed");

    assert_eq!(job.frames_written(), &[1.0, 2.0, 3.0]);
    let log = log.borrow();
    assert_eq!(log.chaser_frames, vec![1.0, 2.0, 3.0]);
    assert_eq!(log.callback_frames, vec![1.0, 2.0, 3.0]);
    assert!(log.finished);
    assert!(out.exists());
}

#[test]
fn test_chaser_failure_aborts() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("abort.usda");
    let scene = asset_scene();
    let log = Rc::new(RefCell::new(Log::default()));

    let args = JobExportArgs::default()
        .with_time_samples(vec![1.0, 2.0, 3.0])
        .with_chasers(["logging"]);
    let mut job = WriteJob::new(args, &scene).with_chaser_registry(logging_registry(&log, Some(2.0)));
    let err = job.write(&out, false).unwrap_err();

    match err {
        Error::ChaserFailed { name, hook } => {
            assert_eq!(name, "logging");
            assert_eq!(hook, "export_frame");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(job.frames_written(), &[1.0]);
    assert!(!log.borrow().finished);
    assert!(!out.exists());
}

#[test]
fn test_unknown_chaser_is_skipped() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("chasers.usda");
    let scene = asset_scene();

    let mut args = JobExportArgs::default()
        .with_time_samples(vec![1.0, 2.0])
        .with_chasers(["missing", MetadataChaser::NAME]);
    let mut chaser_args = ChaserArgs::new();
    chaser_args.insert("prim".into(), "exportInfo".into());
    chaser_args.insert("pipeline".into(), "lookdev".into());
    args.chaser_args.insert(MetadataChaser::NAME.into(), chaser_args);

    let mut job = WriteJob::new(args, &scene);
    job.write(&out, false).expect("export failed");
    assert_eq!(job.extra_prim_paths(), &[p("/exportInfo")]);

    let stage = open_stage(&out);
    assert_eq!(
        stage.attribute_value(&p("/exportInfo"), "frames", TimeCode::Default),
        Some(Value::DoubleArray(vec![1.0, 2.0]))
    );
    let asset = stage.prim(&p("/asset")).unwrap();
    assert_eq!(asset.metadata.get("pipeline"), Some("lookdev"));
}

#[test]
fn test_export_roots() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("roots.usda");
    let scene = asset_scene();

    let args = JobExportArgs::default().with_export_roots(["|asset|cube"]);
    let mut job = WriteJob::new(args, &scene);
    job.write(&out, false).expect("export failed");
    assert_eq!(job.args().default_prim, "cube");

    let stage = open_stage(&out);
    assert!(stage.has_prim(&p("/cube")));
    assert!(!stage.has_prim(&p("/asset")));
    assert!(!stage.has_prim(&p("/sphere")));
}

#[test]
fn test_export_roots_must_intersect() {
    let dir = tempdir().unwrap();
    let mut scene = asset_scene();
    scene.add_node("|other|thing", "transform");

    let args = JobExportArgs::default()
        .with_dag_paths(["|asset"])
        .with_export_roots(["|other"]);
    let err = WriteJob::new(args, &scene)
        .write(dir.path().join("roots.usda"), false)
        .unwrap_err();
    assert!(matches!(err, Error::RootsDoNotIntersect));
}

#[test]
fn test_package_round_trip() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("asset.usdz");
    let scene = asset_scene();

    let mut job = WriteJob::new(JobExportArgs::default(), &scene);
    job.write(&out, false).expect("export failed");
    assert_eq!(job.package_name(), Some(out.as_path()));
    assert!(job.package_error().is_none());
    assert!(!job.file_name().exists());

    let entries = package_entries(&out).unwrap();
    assert_eq!(entries, vec!["asset.usdc".to_string()]);
    let (name, layer) = open_package(&out).unwrap();
    assert_eq!(name, "asset.usdc");
    assert_eq!(layer.metadata.default_prim.as_deref(), Some("asset"));

    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(leftovers.len(), 1);
}

/// `|asset` holding a stage proxy that references `set.usda`.
fn stage_proxy_scene() -> MemoryScene {
    let mut scene = MemoryScene::new();
    let proxy = scene.add_node("|asset|setShape", "stage");
    scene.set_attribute(&proxy, "filePath", Value::Asset("set.usda".into()));
    scene
}

#[test]
fn test_stage_proxy_reopens_from_binary() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("asset.usd");
    let scene = stage_proxy_scene();

    WriteJob::new(JobExportArgs::default(), &scene)
        .write(&out, false)
        .expect("export failed");

    let layer = Layer::open(&out).expect("binary layer with an external reference should reopen");
    let proxy = layer.prim_at_path(&p("/asset")).unwrap();
    assert_eq!(proxy.references[0].asset_path, "set.usda");
    assert!(proxy.references[0].prim_path.is_empty());

    WriteJob::new(JobExportArgs::default(), &scene)
        .write(&out, true)
        .expect("append failed");
}

#[test]
fn test_stage_proxy_package_bundles_reference() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("set.usda"), "#usda 1.0\n").unwrap();
    let out = dir.path().join("asset.usdz");
    let scene = stage_proxy_scene();

    let mut job = WriteJob::new(JobExportArgs::default(), &scene);
    job.write(&out, false).expect("export failed");
    assert!(job.package_error().is_none(), "{:?}", job.package_error());

    let entries = package_entries(&out).unwrap();
    assert_eq!(entries, vec!["asset.usdc".to_string(), "set.usda".to_string()]);
    let (_, layer) = open_package(&out).unwrap();
    assert_eq!(layer.metadata.default_prim.as_deref(), Some("asset"));
}

#[test]
fn test_append_to_package_fails() {
    let dir = tempdir().unwrap();
    let scene = asset_scene();
    let err = WriteJob::new(JobExportArgs::default(), &scene)
        .write(dir.path().join("asset.usdz"), true)
        .unwrap_err();
    assert!(matches!(err, Error::AppendToPackage));
}

#[test]
fn test_extension_fallback() {
    let dir = tempdir().unwrap();
    let scene = asset_scene();

    let mut job = WriteJob::new(JobExportArgs::default(), &scene);
    job.write(dir.path().join("plain"), false).expect("export failed");
    assert!(dir.path().join("plain.usd").exists());

    let args = JobExportArgs::default().with_compatibility(Compatibility::AppleArKit);
    let mut job = WriteJob::new(args, &scene);
    job.write(dir.path().join("device"), false).expect("export failed");
    assert!(dir.path().join("device.usdz").exists());
    assert!(job.package_error().is_none());
}

#[test]
fn test_append_adds_to_existing_layer() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("shared.usda");

    let mut first = MemoryScene::new();
    first.add_node("|first", "transform");
    WriteJob::new(JobExportArgs::default(), &first)
        .write(&out, false)
        .expect("export failed");

    let mut second = MemoryScene::new();
    second.add_node("|second", "transform");
    let args = JobExportArgs::default().with_default_prim("first");
    WriteJob::new(args, &second).write(&out, true).expect("append failed");

    let stage = open_stage(&out);
    assert!(stage.has_prim(&p("/first")));
    assert!(stage.has_prim(&p("/second")));
    assert_eq!(stage.default_prim(), Some("first"));
}

#[test]
fn test_up_axis_is_restored() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("zup.usda");
    let mut scene = asset_scene();
    scene.set_up_axis(Axis::Z);

    let args = JobExportArgs::default().with_up_axis(UpAxisOption::Y);
    WriteJob::new(args, &scene).write(&out, false).expect("export failed");
    assert_eq!(scene.root_correction(), DMat4::IDENTITY);

    let stage = open_stage(&out);
    assert_eq!(stage.layer().metadata.up_axis.as_deref(), Some("Y"));
    assert!(stage.attribute(&p("/asset"), "xformOp:transform").is_some());
}

#[test]
fn test_anonymous_export_stays_in_memory() {
    let scene = asset_scene();
    let mut job = WriteJob::new(JobExportArgs::default(), &scene);
    job.write("anon:scratch", false).expect("export failed");
    let layer = job.layer().expect("layer kept");
    assert!(layer.is_anonymous());
    assert_eq!(layer.root_prim_names(), vec!["asset".to_string()]);
}
