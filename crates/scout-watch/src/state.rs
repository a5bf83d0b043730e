//! Binding state carried across scan cycles

use scout_detect::DeviceProfile;
use tracing::debug;

/// A confirmed pairing of a device profile with a live port
///
/// Holds the connection that answered the handshake, which also keeps the
/// port claimed against other opens. Dropping the binding closes it.
#[derive(Debug)]
pub struct DeviceBinding<P> {
    /// Profile that matched
    pub profile: DeviceProfile,
    /// Port the device answered on
    pub port: String,
    connection: P,
}

impl<P> DeviceBinding<P> {
    fn new(profile: DeviceProfile, port: String, connection: P) -> Self {
        Self {
            profile,
            port,
            connection,
        }
    }

    /// The open connection, for hosts that want to keep talking to the
    /// device after identification
    pub fn connection_mut(&mut self) -> &mut P {
        &mut self.connection
    }
}

/// Mutable scanning state: which profiles exist and which are bound
///
/// Owned and mutated by the scan worker only. Bindings are kept in bind
/// order, so the status text is deterministic and stable across cycles.
#[derive(Debug)]
pub struct WatchState<P> {
    profiles: Vec<DeviceProfile>,
    bindings: Vec<DeviceBinding<P>>,
}

impl<P> WatchState<P> {
    /// Start with every profile unbound
    pub fn new(profiles: Vec<DeviceProfile>) -> Self {
        Self {
            profiles,
            bindings: Vec::new(),
        }
    }

    /// Profiles that still need a port, in configuration order
    pub fn unbound_profiles(&self) -> Vec<DeviceProfile> {
        self.profiles
            .iter()
            .filter(|p| !self.is_bound(&p.name))
            .cloned()
            .collect()
    }

    /// Whether the named profile currently holds a binding
    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.profile.name == name)
    }

    /// Record a confirmed device
    ///
    /// A profile holds at most one binding; callers only bind profiles they
    /// took from [`unbound_profiles`](Self::unbound_profiles).
    pub fn bind(&mut self, profile: DeviceProfile, port: String, connection: P) {
        debug_assert!(!self.is_bound(&profile.name));
        self.bindings
            .push(DeviceBinding::new(profile, port, connection));
    }

    /// Release every binding whose port is absent from `ports`
    ///
    /// Returns the names of the released profiles; they are immediately
    /// eligible for probing again.
    pub fn release_missing(&mut self, ports: &[String]) -> Vec<String> {
        let mut released = Vec::new();
        self.bindings.retain(|binding| {
            if ports.contains(&binding.port) {
                true
            } else {
                debug!("Port {} is gone, releasing {}", binding.port, binding.profile.name);
                released.push(binding.profile.name.clone());
                false
            }
        });
        released
    }

    /// Current bindings, in bind order
    pub fn bindings(&self) -> &[DeviceBinding<P>] {
        &self.bindings
    }

    /// Mutable view of the current bindings
    pub fn bindings_mut(&mut self) -> &mut [DeviceBinding<P>] {
        &mut self.bindings
    }

    /// The per-cycle presence report: one `"<name>: <port>"` entry per
    /// binding, joined with `",\n "`; empty when nothing is bound
    pub fn status_text(&self) -> String {
        self.bindings
            .iter()
            .map(|b| format!("{}: {}", b.profile.name, b.port))
            .collect::<Vec<_>>()
            .join(",\n ")
    }
}
