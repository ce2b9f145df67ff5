use ash::vk;

/// 图像资源描述
///
/// 描述帧图需要设备层创建的图像；内存分配由设备层负责。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgImageDesc {
    pub width: u32,
    pub height: u32,
    /// 图像深度（3D 纹理）
    pub depth: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub samples: vk::SampleCountFlags,
    pub image_type: vk::ImageType,
}

impl Default for RgImageDesc {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            format: vk::Format::R8G8B8A8_UNORM,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::STORAGE,
            samples: vk::SampleCountFlags::TYPE_1,
            image_type: vk::ImageType::TYPE_2D,
        }
    }
}

// new & init & builder
impl RgImageDesc {
    /// 创建 2D 图像描述
    #[inline]
    pub fn new_2d(width: u32, height: u32, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            width,
            height,
            format,
            usage,
            ..Default::default()
        }
    }

    #[inline]
    pub fn with_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    #[inline]
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }
}

// tools
impl RgImageDesc {
    /// 从格式推断 aspect
    pub fn infer_aspect(format: vk::Format) -> vk::ImageAspectFlags {
        match format {
            vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
                vk::ImageAspectFlags::DEPTH
            }
            vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
            vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            }
            _ => vk::ImageAspectFlags::COLOR,
        }
    }

    #[inline]
    pub fn is_depth_stencil(&self) -> bool {
        !Self::infer_aspect(self.format).contains(vk::ImageAspectFlags::COLOR)
    }

    /// 渲染目标隐含的 attachment 用途
    pub fn attachment_usage(&self) -> vk::ImageUsageFlags {
        if self.is_depth_stencil() {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            vk::ImageUsageFlags::COLOR_ATTACHMENT
        }
    }

    /// 描述不合法时返回原因
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(format!("zero extent {}x{}x{}", self.width, self.height, self.depth));
        }
        if self.mip_levels == 0 || self.array_layers == 0 {
            return Err(format!("zero mip levels ({}) or array layers ({})", self.mip_levels, self.array_layers));
        }
        if self.format == vk::Format::UNDEFINED {
            return Err("undefined format".to_string());
        }
        if self.usage.is_empty() {
            return Err("empty usage".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_format_detection() {
        let depth = RgImageDesc::new_2d(64, 64, vk::Format::D32_SFLOAT, vk::ImageUsageFlags::SAMPLED);
        let color = RgImageDesc::new_2d(64, 64, vk::Format::R16G16B16A16_SFLOAT, vk::ImageUsageFlags::SAMPLED);

        assert!(depth.is_depth_stencil());
        assert!(!color.is_depth_stencil());
        assert_eq!(depth.attachment_usage(), vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!(color.attachment_usage(), vk::ImageUsageFlags::COLOR_ATTACHMENT);
    }

    #[test]
    fn test_validate_rejects_zero_extent() {
        let desc = RgImageDesc::new_2d(0, 64, vk::Format::R8_UNORM, vk::ImageUsageFlags::SAMPLED);
        assert!(desc.validate().is_err());
        assert!(RgImageDesc::default().validate().is_ok());
    }
}
