#[cfg(test)]
mod tests {
    use burn::{backend::NdArray, prelude::*};

    use crate::config::{Architecture, PspBackbone, SegNetConfig};
    use crate::error::SegNetError;
    use crate::models::{ENetConfig, PspNetConfig, RefineNetConfig};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_unsupported_backbone_error() {
        match "vgg16".parse::<PspBackbone>() {
            Err(SegNetError::UnsupportedBackbone { backbone }) => {
                assert_eq!(backbone, "vgg16");
            }
            _ => panic!("Expected UnsupportedBackbone error"),
        }
    }

    #[test]
    fn test_backbone_names() {
        assert_eq!("resnet50".parse::<PspBackbone>().unwrap(), PspBackbone::ResNet50);
        assert_eq!("MobileNet".parse::<PspBackbone>().unwrap(), PspBackbone::MobileNet);
        assert_eq!(PspBackbone::MobileNet.name(), "mobilenet");
        assert_eq!(PspBackbone::ResNet50.channels(), (1024, 2048));
        assert_eq!(PspBackbone::MobileNet.channels(), (96, 320));
    }

    #[test]
    fn test_unsupported_backbone_message() {
        let err = "xception".parse::<PspBackbone>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported backbone: `xception`, use mobilenet, resnet50"
        );
    }

    #[test]
    fn test_invalid_downsample_factor() {
        let config = SegNetConfig::PspNet(PspNetConfig::new(3).with_downsample_factor(4));

        match config.validate() {
            Err(SegNetError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("downsample_factor must be 8 or 16"));
            }
            _ => panic!("Expected InvalidConfiguration error"),
        }
    }

    #[test]
    fn test_zero_classes() {
        for architecture in [
            Architecture::ENet,
            Architecture::PspNet,
            Architecture::RefineNet,
        ] {
            let config = SegNetConfig::for_architecture(&architecture, 3, 0);
            let result = config.validate();
            assert!(result.is_err());
            match result.unwrap_err() {
                SegNetError::InvalidConfiguration { reason } => {
                    assert!(reason.contains("num_classes"));
                }
                _ => panic!("Expected InvalidConfiguration error"),
            }
        }
    }

    #[test]
    fn test_valid_configuration() {
        let config = SegNetConfig::for_architecture(&Architecture::RefineNet, 6, 3);

        assert!(config.validate().is_ok());
        assert_eq!(config.architecture(), Architecture::RefineNet);
        assert_eq!(config.bands(), 6);
        assert_eq!(config.num_classes(), 3);
    }

    #[test]
    fn test_architecture_names() {
        assert_eq!("ENet".parse::<Architecture>().unwrap(), Architecture::ENet);
        assert_eq!("psp".parse::<Architecture>().unwrap(), Architecture::PspNet);
        assert_eq!("refinenet".parse::<Architecture>().unwrap(), Architecture::RefineNet);
        assert!(matches!(
            "unet".parse::<Architecture>(),
            Err(SegNetError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pspnet.json");

        let config = SegNetConfig::PspNet(
            PspNetConfig::new(5)
                .with_bands(4)
                .with_backbone(PspBackbone::MobileNet)
                .with_aux_branch(true),
        );
        config.save(&path).unwrap();

        let loaded = SegNetConfig::load_validated(&path).unwrap();
        match loaded {
            SegNetConfig::PspNet(psp) => {
                assert_eq!(psp.num_classes, 5);
                assert_eq!(psp.bands, 4);
                assert_eq!(psp.backbone, PspBackbone::MobileNet);
                assert!(psp.aux_branch);
            }
            _ => panic!("Expected PspNet configuration"),
        }
    }

    #[test]
    fn test_load_validated_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enet.json");

        SegNetConfig::ENet(ENetConfig::new().with_num_classes(0))
            .save(&path)
            .unwrap();

        assert!(matches!(
            SegNetConfig::load_validated(&path),
            Err(SegNetError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            SegNetConfig::load_validated(dir.path().join("missing.json")),
            Err(SegNetError::Config(_))
        ));
    }

    #[test]
    fn test_segnet_forward() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random(
            [1, 4, 32, 32],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        let configs = [
            SegNetConfig::ENet(ENetConfig::new().with_bands(4).with_num_classes(2)),
            SegNetConfig::PspNet(
                PspNetConfig::new(2)
                    .with_bands(4)
                    .with_backbone(PspBackbone::MobileNet)
                    .with_aux_branch(true),
            ),
            SegNetConfig::RefineNet(RefineNetConfig::rf18(2, 4)),
        ];

        for config in configs {
            let model = config.init::<TestBackend>(&device).unwrap();
            assert_eq!(model.bands(), 4);

            let output = model.forward(x.clone()).unwrap();
            assert_eq!(output.logits.dims(), [1, 2, 32, 32]);
            assert_eq!(
                output.aux.is_some(),
                matches!(config, SegNetConfig::PspNet(_))
            );
        }
    }

    #[test]
    fn test_segnet_rejects_wrong_bands() {
        let device = Default::default();
        let model = SegNetConfig::for_architecture(&Architecture::ENet, 3, 2)
            .init::<TestBackend>(&device)
            .unwrap();
        let x = Tensor::<TestBackend, 4>::zeros([1, 6, 32, 32], &device);

        match model.forward(x) {
            Err(SegNetError::InvalidTensorShape { expected, actual }) => {
                assert!(expected.contains('3'));
                assert!(actual.contains('6'));
            }
            _ => panic!("Expected InvalidTensorShape error"),
        }
    }
}
