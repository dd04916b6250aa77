//! Crd command

use kube::CustomResourceExt;
use tessera_common::crd::Worker;

use crate::Result;

pub fn run() -> Result<()> {
    print!("{}", render()?);
    Ok(())
}

fn render() -> Result<String> {
    Ok(serde_yaml::to_string(&Worker::crd())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crd_yaml_names_worker_kind() {
        let yaml = render().unwrap();
        assert!(yaml.contains("kind: CustomResourceDefinition"));
        assert!(yaml.contains("workers.extensions.tessera.dev"));
    }
}
