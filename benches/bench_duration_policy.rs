// benches/bench_duration_policy.rs
use adaptive_signal_control::control_system::duration_policy::DurationPolicy;
use adaptive_signal_control::control_system::intersection_state::IntersectionState;
use adaptive_signal_control::{Direction, SignalConfig};
use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration,
};
use std::collections::HashMap;
use std::time::Duration;

fn bench_duration_policy(c: &mut Criterion) {
    let mut group = c.benchmark_group("duration_policy");

    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    let config = SignalConfig::default();
    let policy = DurationPolicy::new(&config);

    // Light, mixed and saturated traffic.
    for &load in [0u32, 5, 20].iter() {
        let mut state = IntersectionState::new(&config);
        let counts: HashMap<Direction, u32> = Direction::ALL
            .iter()
            .enumerate()
            .map(|(i, &d)| (d, load + i as u32))
            .collect();
        state.replace_vehicle_counts(&counts);

        group.bench_function(format!("load_{}", load), |b| {
            b.iter(|| {
                for d in Direction::ALL {
                    black_box(policy.green_duration(&state, d));
                    black_box(policy.red_duration(&state, d));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_duration_policy);
criterion_main!(benches);
