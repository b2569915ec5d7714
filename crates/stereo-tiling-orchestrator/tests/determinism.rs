//! The same task graph gives the same results on every backend.

use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use serde_json::json;
use stereo_tiling_orchestrator::{
    task_fn, Cluster, ClusterConfig, ClusterMode, DenseTile, Deferred, OrchestratorError,
    SparseTile, TaskArgs, TaskValue, WrapperMode,
};

const ROWS: usize = 3;
const COLS: usize = 4;

fn arg_i64(args: &TaskArgs, name: &str) -> Result<i64, OrchestratorError> {
    args.get_named(name)?
        .as_meta()
        .and_then(|v| v.as_i64())
        .ok_or_else(|| OrchestratorError::task(format!("`{name}` is not an integer")))
}

/// Two stages: one tile per index, then pairwise fusion into a dense mean
/// and a sparse list of the cells above a threshold.
fn run_graph(cluster: &dyn Cluster) -> Vec<(Vec<f64>, Vec<f64>, Option<PathBuf>)> {
    let make = cluster.create_task(
        task_fn(|args| {
            let i = arg_i64(&args, "index")? as f64;
            let values = (0..ROWS * COLS)
                .map(|k| (i * 0.37 + k as f64 * 0.11).sin() * 100.0)
                .collect();
            Ok(vec![DenseTile::new(ROWS, COLS).with_band("disp", values)?.into()])
        }),
        1,
    );
    let fuse = cluster.create_task(
        task_fn(|args| {
            let a = args.get(0)?.as_dense().ok_or_else(|| OrchestratorError::task("left"))?;
            let b = args.get(1)?.as_dense().ok_or_else(|| OrchestratorError::task("right"))?;
            let (da, db) = (a.band("disp").unwrap_or(&[]), b.band("disp").unwrap_or(&[]));
            let mean: Vec<f64> = da.iter().zip(db).map(|(x, y)| 0.5 * (x + y)).collect();
            let above: Vec<f64> = mean
                .iter()
                .enumerate()
                .filter(|(_, v)| **v > 10.0)
                .map(|(k, _)| k as f64)
                .collect();
            let dense = DenseTile::new(ROWS, COLS).with_band("disp", mean)?;
            let sparse = SparseTile::new().with_column("cell", above)?;
            Ok(vec![dense.into(), sparse.into()])
        }),
        2,
    );

    let stage1: Vec<Deferred> = (0..8)
        .map(|i| make.call1(TaskArgs::new().named("index", json!(i))).unwrap())
        .collect();
    let stage2: Vec<Vec<Deferred>> = stage1
        .windows(2)
        .map(|w| {
            fuse.call(TaskArgs::new().arg(w[0].clone()).arg(w[1].clone()))
                .unwrap()
        })
        .collect();

    let wrapper = cluster.wrapper();
    stage2
        .iter()
        .map(|outs| {
            let values = cluster.start_tasks(outs).unwrap();
            let handle = values[0].as_handle().map(|h| relative(&h.path));
            let dense = wrapper.get_obj(values[0].clone()).unwrap();
            let sparse = wrapper.get_obj(values[1].clone()).unwrap();
            (
                dense.as_dense().unwrap().band("disp").unwrap().to_vec(),
                sparse.as_sparse().unwrap().column("cell").unwrap().to_vec(),
                handle,
            )
        })
        .collect()
}

fn relative(path: &Path) -> PathBuf {
    path.file_name().map(PathBuf::from).unwrap_or_default()
}

fn config(mode: ClusterMode, wrapper: WrapperMode) -> ClusterConfig {
    ClusterConfig {
        mode,
        nb_workers: 2,
        wrapper,
    }
}

#[test]
fn sequential_and_two_workers_agree() {
    for wrapper in [WrapperMode::None, WrapperMode::Disk] {
        let seq_dir = tempfile::tempdir().unwrap();
        let pool_dir = tempfile::tempdir().unwrap();
        let seq = config(ClusterMode::Sequential, wrapper)
            .build_cluster(seq_dir.path())
            .unwrap();
        let pool = config(ClusterMode::ThreadPool, wrapper)
            .build_cluster(pool_dir.path())
            .unwrap();

        let a = run_graph(seq.as_ref());
        let b = run_graph(pool.as_ref());
        assert_eq!(a.len(), b.len());
        for ((da, sa, ha), (db, sb, hb)) in a.iter().zip(&b) {
            assert!(da.iter().zip(db).all(|(x, y)| x.to_bits() == y.to_bits()));
            assert_eq!(sa, sb);
            // Dump ids are drawn at submission, so names match too.
            assert_eq!(ha, hb);
        }
        seq.cleanup().unwrap();
        pool.cleanup().unwrap();
    }
}

#[test]
fn fused_tile_is_the_mean_of_its_inputs() {
    let cluster = config(ClusterMode::ThreadPool, WrapperMode::None)
        .build_cluster(Path::new("."))
        .unwrap();
    let results = run_graph(cluster.as_ref());
    let value = |i: f64, k: usize| (i * 0.37 + k as f64 * 0.11).sin() * 100.0;
    for (pair, (dense, _, handle)) in results.iter().enumerate() {
        assert!(handle.is_none());
        for (k, v) in dense.iter().enumerate() {
            let expected = 0.5 * (value(pair as f64, k) + value(pair as f64 + 1.0, k));
            assert_relative_eq!(expected, *v, max_relative = 1e-12);
        }
    }
}
