#![allow(dead_code)]

use std::sync::Arc;

use sluice_provision::{ProvisioningConfig, ProvisioningManager};
use sluice_remote::{Clock, FixedClock, RemoteResourceClient};
use sluice_test_utils::{test_config, test_day, MockResourceClient};

/// A manager wired to a counting mock and a clock the test controls.
pub struct Harness {
    pub manager: ProvisioningManager,
    pub client: Arc<MockResourceClient>,
    pub clock: Arc<FixedClock>,
}

pub fn manager_with_mock(config: ProvisioningConfig) -> Harness {
    manager_with_client(MockResourceClient::new(), config)
}

pub fn manager_with_client(client: MockResourceClient, config: ProvisioningConfig) -> Harness {
    let client = Arc::new(client);
    let clock = Arc::new(FixedClock::new(test_day()));
    let manager = ProvisioningManager::builder(
        Arc::clone(&client) as Arc<dyn RemoteResourceClient>,
        config,
    )
    .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
    .build()
    .expect("Failed to build provisioning manager");
    Harness {
        manager,
        client,
        clock,
    }
}

pub fn default_harness() -> Harness {
    manager_with_mock(test_config())
}
