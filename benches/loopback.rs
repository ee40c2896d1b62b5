use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serial_iface::port::{
    EventKind, LoopbackBuffer, SerialInterface, SerialInterfaceExt, VirtualSerialInterface,
};
use std::hint::black_box;
use std::time::Duration;

pub fn bench_loopback_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("loopback_buffer");
    for size in [16usize, 256, 4096] {
        let payload = vec![0x55u8; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            let mut buffer = LoopbackBuffer::new(b"\r\n");
            b.iter(|| {
                buffer.push_framed(black_box(payload));
                black_box(buffer.take(payload.len() + 2));
            })
        });
    }
    group.finish();
}

pub fn bench_virtual_round_trip(c: &mut Criterion) {
    let port = VirtualSerialInterface::new().with_terminator(b"\n");
    let handle = port.open("VPORT0", false).unwrap();
    port.wait_events(handle).unwrap();

    c.bench_function("virtual_write_wait_read", |b| {
        b.iter(|| {
            port.write(handle, black_box(b"AT+GMR")).unwrap();
            let events = port.wait_events(handle).unwrap();
            debug_assert_eq!(events[0].kind, EventKind::RxChar);
            black_box(port.read_available(handle).unwrap());
        })
    });

    port.close(handle).unwrap();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_loopback_buffer, bench_virtual_round_trip
}
criterion_main!(benches);
