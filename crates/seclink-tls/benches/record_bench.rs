//! Record protection benchmarks.
//!
//! Run with: cargo bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use seclink_provider::testing::TestProvider;
use seclink_tls::crypt::{DirectionKeys, SuiteParams};
use seclink_tls::record::{CipherContext, ContentType};
use seclink_tls::{CipherSuite, TlsVersion};
use seclink_types::CipherDirection;

const SUITES: &[(&str, CipherSuite)] = &[
    ("rc4_128_sha", CipherSuite::SSL_RSA_WITH_RC4_128_SHA),
    ("3des_ede_cbc_sha", CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA),
];

fn direction_keys(params: &SuiteParams) -> DirectionKeys {
    DirectionKeys {
        mac_secret: vec![0x0b; params.mac_len()],
        key: vec![0x0c; params.expanded_key_len],
        iv: vec![0x0d; params.iv_len],
    }
}

fn context(provider: &TestProvider, suite: CipherSuite, direction: CipherDirection) -> CipherContext {
    let params = SuiteParams::from_suite(suite).unwrap();
    let keys = direction_keys(&params);
    CipherContext::new(provider, params, TlsVersion::Tls10, &keys, direction).unwrap()
}

fn bench_seal(c: &mut Criterion) {
    let provider = TestProvider::new(7);
    let mut group = c.benchmark_group("record_seal");

    for &(name, suite) in SUITES {
        for size in [256usize, 1500, 16384] {
            group.bench_with_input(
                BenchmarkId::new(name, size),
                &size,
                |bench, &size| {
                    let payload = vec![0x5au8; size];
                    let mut seal = context(&provider, suite, CipherDirection::Encrypt);
                    bench.iter(|| {
                        seal.seal(&provider, ContentType::ApplicationData as u8, &payload)
                            .unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let provider = TestProvider::new(7);
    let mut group = c.benchmark_group("record_round_trip");

    for &(name, suite) in SUITES {
        for size in [256usize, 16384] {
            group.bench_with_input(
                BenchmarkId::new(name, size),
                &size,
                |bench, &size| {
                    let payload = vec![0x5au8; size];
                    // Both directions advance in lockstep, so every sealed
                    // record opens against the matching sequence number.
                    let mut seal = context(&provider, suite, CipherDirection::Encrypt);
                    let mut open = context(&provider, suite, CipherDirection::Decrypt);
                    bench.iter(|| {
                        let sealed = seal
                            .seal(&provider, ContentType::ApplicationData as u8, &payload)
                            .unwrap();
                        open.open(&provider, ContentType::ApplicationData as u8, &sealed)
                            .unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_seal, bench_round_trip);
criterion_main!(benches);
