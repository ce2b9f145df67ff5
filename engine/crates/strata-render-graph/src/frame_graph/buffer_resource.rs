use ash::vk;

/// 缓冲区资源描述
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgBufferDesc {
    /// 缓冲区大小（字节）
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
}

impl Default for RgBufferDesc {
    fn default() -> Self {
        Self {
            size: 0,
            usage: vk::BufferUsageFlags::STORAGE_BUFFER,
        }
    }
}

// new & init
impl RgBufferDesc {
    #[inline]
    pub fn new(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self { size, usage }
    }

    /// 描述不合法时返回原因
    pub fn validate(&self) -> Result<(), String> {
        if self.size == 0 {
            return Err("zero size".to_string());
        }
        if self.usage.is_empty() {
            return Err("empty usage".to_string());
        }
        Ok(())
    }
}
