//! Two clients with equal-sized address spaces resolve the same offset to
//! disjoint logical pages.

use std::sync::Arc;

use tiermem::server::{AccessMsg, OpKind};
use tiermem::util::numa::MockNuma;
use tiermem::TierMemBuilder;

#[test]
fn clients_resolve_offsets_into_disjoint_ranges() {
    let mut builder = TierMemBuilder::new_no_env_vars();
    assert!(builder.set_options_bulk_by_str(
        "clients=4,uniform;4,uniform local_pages=8 remote_pages=0 pmem_pages=0 buffer_size=16"
    ));
    let tiermem = builder.build(Arc::new(MockNuma::new())).unwrap();
    let server = tiermem.server();

    assert_eq!(server.resolve_page_id(0, 3), 3);
    assert_eq!(server.resolve_page_id(1, 3), 7);

    server.handle_access(AccessMsg { client_id: 0, offset: 3, op: OpKind::Read });
    server.handle_access(AccessMsg { client_id: 1, offset: 3, op: OpKind::Write });

    // The same offset advanced counters on disjoint entries.
    let table = tiermem.page_table();
    assert_eq!(table.get(3).access_count, 1);
    assert_eq!(table.get(7).access_count, 1);
    for page_id in [0, 1, 2, 4, 5, 6] {
        assert_eq!(table.get(page_id).access_count, 0);
    }
}
