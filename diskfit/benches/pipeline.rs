use criterion::{black_box, criterion_group, criterion_main, Criterion};
use diskfit::convolution::{convolve3d_same, convolve3d_with_spectrum, Kernel, KernelSpectrum};
use diskfit::{
    make_3d_psf, BinMap, DiskParameters, GaussianParams, ModelPipeline, ModelSettings,
    ObservationSetup, Shape2D, SpectralAxis, VelocityFieldBuilder,
};
use ndarray::{Array1, Array3};

const LAM0: f64 = 0.6563;

fn make_axis(n: usize) -> SpectralAxis {
    let log_lambda = Array1::linspace((LAM0 * 0.99).ln(), (LAM0 * 1.01).ln(), n);
    SpectralAxis::new(log_lambda, LAM0).unwrap()
}

fn make_setup(shape: Shape2D) -> ObservationSetup {
    ObservationSetup {
        shape,
        axis: make_axis(64),
        seeing_fwhm: 2.0,
        instrumental_fwhm: 2e-4,
        dispersion: 60.0,
        light: GaussianParams::circular(shape.width as f64 / 2.0, shape.height as f64 / 2.0, 4.0),
        bins: BinMap::per_pixel(shape),
    }
}

fn make_params(shape: Shape2D) -> DiskParameters {
    let (xc, yc) = shape.center();
    DiskParameters::new(30.0, xc, yc, 0.0, 1.0, 9.0, 60.0).unwrap()
}

fn bench_velocity_field(c: &mut Criterion) {
    let builder = VelocityFieldBuilder::default();
    let shape = Shape2D::new(30, 30);
    let params = make_params(shape);

    let mut group = c.benchmark_group("velocity_field");
    for k in [1usize, 3, 5] {
        group.bench_function(format!("30x30_oversample_{k}"), |b| {
            b.iter(|| builder.build(black_box(&params), black_box(shape), black_box(k)))
        });
    }
    group.finish();
}

fn bench_convolution(c: &mut Criterion) {
    let axis = make_axis(64);
    let shape = Shape2D::new(60, 60);
    let psf = make_3d_psf(6.0, 2e-4, shape, &axis.log_lambda()).unwrap();
    let cube = Array3::from_shape_fn((64, 60, 60), |(l, i, j)| ((l * 7 + i * 3 + j) % 11) as f64);
    let spectrum = KernelSpectrum::new(&psf.view()).unwrap();

    let mut group = c.benchmark_group("convolve3d_64x60x60");
    group.bench_function("kernel_each_call", |b| {
        b.iter(|| convolve3d_same(black_box(&cube.view()), Kernel::Spatial(psf.view())))
    });
    group.bench_function("precomputed_spectrum", |b| {
        b.iter(|| convolve3d_with_spectrum(black_box(&cube.view()), black_box(&spectrum)))
    });
    group.finish();
}

fn bench_pipeline_evaluate(c: &mut Criterion) {
    let shape = Shape2D::new(20, 20);
    let params = make_params(shape);

    let mut group = c.benchmark_group("pipeline_evaluate_20x20x64");
    group.sample_size(20);
    for k in [1usize, 3] {
        let settings = ModelSettings {
            oversample: k,
            ..ModelSettings::default()
        };
        let pipeline = ModelPipeline::new(make_setup(shape), settings).unwrap();
        group.bench_function(format!("oversample_{k}"), |b| {
            b.iter(|| pipeline.evaluate(black_box(&params)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_velocity_field,
    bench_convolution,
    bench_pipeline_evaluate,
);
criterion_main!(benches);
