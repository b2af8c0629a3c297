// benches/bench_traffic_light_controller.rs
use adaptive_signal_control::control_system::intersection_state::IntersectionState;
use adaptive_signal_control::control_system::traffic_light_controller::advance_signals;
use adaptive_signal_control::{Direction, SignalConfig, TrafficLightController};
use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration,
};
use std::collections::HashMap;
use std::time::Duration;

fn counts(n: u32) -> HashMap<Direction, u32> {
    Direction::ALL
        .iter()
        .enumerate()
        .map(|(i, &d)| (d, (n + i as u32 * 3) % 12))
        .collect()
}

fn bench_advance_signals(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance_signals");

    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    // Simulated run lengths in ticks; counts change every 10 ticks.
    for &ticks in [60u32, 600, 3600].iter() {
        group.bench_function(format!("ticks_{}", ticks), |b| {
            let config = SignalConfig::default();
            b.iter(|| {
                let mut state = IntersectionState::new(&config);
                for t in 0..ticks {
                    if t % 10 == 0 {
                        state.replace_vehicle_counts(&counts(t));
                    }
                    advance_signals(&mut state, &config);
                }
                black_box(&state);
            });
        });
    }
    group.finish();
}

fn bench_controller_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("controller_step");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));

    let controller = TrafficLightController::new(SignalConfig::default()).unwrap();
    controller.update_vehicle_counts(&counts(4));
    group.bench_function("step_and_snapshot", |b| {
        b.iter(|| {
            controller.step().unwrap();
            black_box(controller.get_status());
        });
    });
    group.finish();
}

criterion_group!(benches, bench_advance_signals, bench_controller_step);
criterion_main!(benches);
