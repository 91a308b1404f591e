//! The regcred-injector workflow: a mutating admission webhook that creates a
//! registry pull secret in the pod's namespace before the pod is scheduled.

use crate::diagram::{Diagram, DiagramBuilder, NodeKind};
use crate::error::Result;

pub const NAME: &str = "regcred-injector";

pub fn regcred_injector() -> Result<Diagram> {
    let mut b = DiagramBuilder::new(NAME);

    let api = b.node(NodeKind::Api, "Control Plane");
    let registry = b.node(NodeKind::Registry, "DockerHub");

    let (injector, certs) = b.cluster("kube-system", |b| {
        let injector = b.node(NodeKind::Deployment, "regcred-injector");
        let certs = b.node(NodeKind::Secret, "Credential/Certs");
        (injector, certs)
    })?;

    let (pod, regcred) = b.cluster("default", |b| {
        let pod = b.node(NodeKind::Pod, "new-pod");
        let regcred = b.node(NodeKind::Secret, "regcred");
        (pod, regcred)
    })?;

    // Steps 1 and 4 point along the admission request and its response.
    b.edge(api, injector, "1 mutate webhook")
        .edge(injector, certs, "2 fetch credential")
        .edge(injector, regcred, "3 create registry credential")
        .edge(injector, api, "4 return mutated response")
        .edge(api, pod, "5 create pod")
        .edge(pod, regcred, "6 use registry credential")
        .edge(pod, registry, "7 authenticated pull");

    b.build()
}
